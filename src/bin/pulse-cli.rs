//! Pulse CLI
//!
//! 非交互式命令行，用于查看球员、投票、点赞，以及维护本地回退存储

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pulse_sdk_core::pulse::models::{
    Comment, Entity, Group, Like, Message, Notification, Player, Post, Profile, Vote,
};
use pulse_sdk_core::pulse::toast::LogToastListener;
use pulse_sdk_core::pulse::view::PositionFilter;
use pulse_sdk_core::{ClientConfig, CollectionBinding, PulseClient, StoreBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Local,
    Remote,
}

/// Ballon d'Or Pulse CLI
#[derive(Parser, Debug)]
#[command(name = "pulse-cli")]
#[command(about = "Ballon d'Or Pulse CLI - 查看与操作投票数据", long_about = None)]
struct Args {
    /// 存储后端
    #[arg(long, value_enum, default_value = "local")]
    backend: Backend,

    /// 本地回退存储的数据库地址
    #[arg(long, default_value = "sqlite://pulse.db?mode=rwc")]
    db_url: String,

    /// 远程存储 REST 地址
    #[arg(long, env = "PULSE_API_URL")]
    api_url: Option<String>,

    /// 远程存储实时通道地址
    #[arg(long, env = "PULSE_REALTIME_URL")]
    realtime_url: Option<String>,

    /// 远程存储 API key
    #[arg(long, env = "PULSE_API_KEY")]
    api_key: Option<String>,

    /// 当前用户
    #[arg(short, long)]
    user: Option<String>,

    /// 日志级别（默认: info,pulse_sdk_core=debug）
    #[arg(long, default_value = "info,pulse_sdk_core=debug")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出球员
    Players {
        /// attaquant / milieu / defenseur，其它值表示全部
        #[arg(short, long, default_value = "all")]
        position: String,
    },
    /// 排行榜
    Ranking {
        #[arg(short, long, default_value = "all")]
        position: String,
    },
    /// 为球员投票
    Vote {
        player_id: String,
        #[arg(default_value = "1")]
        value: i64,
    },
    /// 点赞或取消点赞球员
    Like { player_id: String },
    /// 当前用户的通知
    Notifications {
        /// 全部标记为已读
        #[arg(long)]
        mark_read: bool,
    },
    /// 导出本地数据到文件（为空时打印到 stdout）
    Export { output: Option<PathBuf> },
    /// 从文件导入本地数据
    Import { input: PathBuf },
    /// 恢复本地默认数据
    Reset,
    /// 监听集合的变化
    Watch {
        collection: String,
        /// 运行时长（秒），0 表示持续运行
        #[arg(short, long, default_value = "0")]
        duration: u64,
    },
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .context("无法创建日志文件 debug.log")?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("日志初始化失败: {}", e))?;

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
    Ok(())
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let backend = match args.backend {
        Backend::Memory => StoreBackend::Memory,
        Backend::Local => StoreBackend::Local {
            db_url: args.db_url.clone(),
        },
        Backend::Remote => StoreBackend::Remote {
            api_base_url: args
                .api_url
                .clone()
                .ok_or_else(|| anyhow!("远程存储需要 --api-url"))?,
            realtime_url: args.realtime_url.clone(),
            api_key: args
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("远程存储需要 --api-key"))?,
        },
    };
    Ok(ClientConfig {
        user_id: args.user.clone(),
        backend,
        show_toasts: true,
    })
}

fn require_user(client: &PulseClient) -> Result<String> {
    client
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("该命令需要 --user"))
}

async fn print_json<E: Entity>(binding: &CollectionBinding<E>) -> Result<()> {
    binding.loaded().await;
    if let Some(err) = binding.error() {
        return Err(anyhow!(err));
    }
    println!("{}", serde_json::to_string_pretty(&binding.snapshot())?);
    Ok(())
}

/// 监听某个集合，每次快照变化时打印
async fn watch<E: Entity>(binding: CollectionBinding<E>, duration: u64) -> Result<()> {
    let mut changes = binding.changes();
    binding.loaded().await;
    info!("[CLI/Watch] 📋 {} 条记录", binding.snapshot().len());

    let run = async {
        while changes.changed().await.is_ok() {
            if let Some(err) = binding.error() {
                warn!("[CLI/Watch] ⚠️ {}", err);
                continue;
            }
            let snapshot = binding.snapshot();
            info!("[CLI/Watch] 🔄 快照变化: {} 条记录", snapshot.len());
            match serde_json::to_string(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("[CLI/Watch] ❌ 序列化失败: {}", e),
            }
        }
    };

    if duration > 0 {
        info!("[CLI] ⏰ {} 秒后自动退出", duration);
        let _ = tokio::time::timeout(Duration::from_secs(duration), run).await;
    } else {
        info!("[CLI] ⏰ 持续运行中，按 Ctrl+C 退出");
        tokio::select! {
            _ = run => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    binding.close();
    info!("[CLI] 👋 程序退出");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level)?;

    info!("[CLI] 🚀 Ballon d'Or Pulse CLI");
    let mut client = PulseClient::connect(client_config(&args)?).await?;
    client.set_toast_listener(Arc::new(LogToastListener));

    match args.command {
        Command::Players { position } => {
            let filter: PositionFilter = position.parse()?;
            let board = client.board();
            board.loaded().await;
            for view in board.views(filter) {
                println!(
                    "{:>4}  {:<24} {:<10} {:<20} {:>5} votes{}",
                    view.player.id,
                    view.player.name,
                    view.player.position.label(),
                    view.player.club,
                    view.votes,
                    if view.is_liked { "  ♥" } else { "" }
                );
            }
            board.close();
        }
        Command::Ranking { position } => {
            let filter: PositionFilter = position.parse()?;
            let board = client.board();
            board.loaded().await;
            if let Some(err) = board.error() {
                return Err(anyhow!(err));
            }
            for entry in board.ranking(filter) {
                println!(
                    "#{:<3} {:<24} {:>5} votes",
                    entry.rank, entry.view.player.name, entry.view.votes
                );
            }
            board.close();
        }
        Command::Vote { player_id, value } => {
            let user = require_user(&client)?;
            let players = Arc::new(client.players());
            let card = client.player_card(players, &player_id);
            card.loaded().await;
            let vote = card.vote(value).await?;
            info!("[CLI] ✅ 投票成功: {} -> {}", user, vote.player_id);
            if let Some(view) = card.view() {
                println!("{}: {} votes", view.player.name, view.votes);
            }
            card.close();
        }
        Command::Like { player_id } => {
            require_user(&client)?;
            let players = Arc::new(client.players());
            let card = client.player_card(players, &player_id);
            card.loaded().await;
            let liked = card.toggle_like().await?;
            println!("{}", if liked { "liked" } else { "unliked" });
            card.close();
        }
        Command::Notifications { mark_read } => {
            require_user(&client)?;
            let notifications = client.notifications();
            notifications.loaded().await;
            if mark_read {
                let count = notifications.mark_all_as_read().await?;
                info!("[CLI] 📖 已标记 {} 条通知为已读", count);
            }
            println!("unread: {}", notifications.unread_count());
            print_json(&notifications).await?;
            notifications.close();
        }
        Command::Export { output } => {
            let local = client
                .local_store()
                .ok_or_else(|| anyhow!("导出仅支持本地存储"))?;
            let json = local.export_data().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("写入 {} 失败", path.display()))?;
                    info!("[CLI] 💾 已导出到 {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { input } => {
            let local = client
                .local_store()
                .ok_or_else(|| anyhow!("导入仅支持本地存储"))?;
            let json = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("读取 {} 失败", input.display()))?;
            local.import_data(&json).await?;
            info!("[CLI] ✅ 已导入 {}", input.display());
        }
        Command::Reset => {
            let local = client
                .local_store()
                .ok_or_else(|| anyhow!("重置仅支持本地存储"))?;
            local.reset_data().await?;
            info!("[CLI] ✅ 已恢复默认数据");
        }
        Command::Watch {
            collection,
            duration,
        } => match collection.as_str() {
            "players" => watch(client.open_all::<Player>(), duration).await?,
            "votes" => watch(client.open_all::<Vote>(), duration).await?,
            "likes" => watch(client.open_all::<Like>(), duration).await?,
            "posts" => watch(client.open_all::<Post>(), duration).await?,
            "comments" => watch(client.open_all::<Comment>(), duration).await?,
            "messages" => watch(client.open_all::<Message>(), duration).await?,
            "notifications" => watch(client.notifications(), duration).await?,
            "profiles" => watch(client.open_all::<Profile>(), duration).await?,
            "groups" => watch(client.open_all::<Group>(), duration).await?,
            other => return Err(anyhow!("未知集合: {}", other)),
        },
    }

    Ok(())
}
