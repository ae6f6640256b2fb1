//! 客户端入口
//!
//! 按配置创建进程内唯一的存储连接，所有绑定共享它。

use crate::pulse::binding::CollectionBinding;
use crate::pulse::models::{
    Comment, Entity, Group, Like, LikeSubject, Message, Notification, Player, Post, Profile, Vote,
};
use crate::pulse::store::remote::RemoteStoreConfig;
use crate::pulse::store::{LocalStore, MemoryStore, RemoteStore, Store};
use crate::pulse::toast::{EmptyToastListener, ToastListener};
use crate::pulse::view::{PlayerBoard, PlayerCard};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// 存储后端
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// 进程内存储（带默认数据），不持久化
    Memory,
    /// 本地回退存储
    ///
    /// 例如：`sqlite://pulse.db?mode=rwc`
    Local { db_url: String },
    /// 远程托管存储
    Remote {
        api_base_url: String,
        /// 为空时不启动实时通道
        realtime_url: Option<String>,
        api_key: String,
    },
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 当前登录用户；为空时与用户相关的绑定不做任何事
    pub user_id: Option<String>,
    pub backend: StoreBackend,
    /// 失败的操作是否弹出提示
    pub show_toasts: bool,
}

impl ClientConfig {
    /// 创建默认配置（本地回退存储）
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            backend: StoreBackend::Local {
                db_url: "sqlite://pulse.db?mode=rwc".to_string(),
            },
            show_toasts: true,
        }
    }
}

/// 客户端
pub struct PulseClient {
    config: ClientConfig,
    store: Arc<dyn Store>,
    local: Option<Arc<LocalStore>>,
    toast_listener: Arc<dyn ToastListener>,
}

impl PulseClient {
    /// 按配置连接存储
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        info!(
            "[Client] 🔗 连接存储 (user={:?}, backend={:?})",
            config.user_id, config.backend
        );
        let (store, local): (Arc<dyn Store>, Option<Arc<LocalStore>>) = match &config.backend {
            StoreBackend::Memory => {
                let memory: Arc<dyn Store> = Arc::new(MemoryStore::seeded());
                (memory, None)
            }
            StoreBackend::Local { db_url } => {
                let local = Arc::new(LocalStore::new(db_url).await?);
                let store: Arc<dyn Store> = local.clone();
                (store, Some(local))
            }
            StoreBackend::Remote {
                api_base_url,
                realtime_url,
                api_key,
            } => {
                let remote = RemoteStore::connect(RemoteStoreConfig {
                    api_base_url: api_base_url.clone(),
                    realtime_url: realtime_url.clone(),
                    api_key: api_key.clone(),
                })?;
                let store: Arc<dyn Store> = Arc::new(remote);
                (store, None)
            }
        };
        info!("[Client] ✅ 存储已就绪");

        Ok(Self {
            config,
            store,
            local,
            toast_listener: Arc::new(EmptyToastListener),
        })
    }

    /// 使用已有的存储（测试或自定义实现）
    pub fn with_store(config: ClientConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            store,
            local: None,
            toast_listener: Arc::new(EmptyToastListener),
        }
    }

    /// 设置提示监听器；只影响之后打开的绑定
    pub fn set_toast_listener(&mut self, listener: Arc<dyn ToastListener>) {
        self.toast_listener = listener;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.user_id.as_deref()
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// 使用本地回退存储时可用（导出、导入、重置）
    pub fn local_store(&self) -> Option<&Arc<LocalStore>> {
        self.local.as_ref()
    }

    fn toasts(&self) -> Option<Arc<dyn ToastListener>> {
        self.config
            .show_toasts
            .then(|| self.toast_listener.clone())
    }

    pub fn open<E: Entity>(&self, scope_key: Option<&str>) -> CollectionBinding<E> {
        CollectionBinding::open_with(self.store.clone(), scope_key, self.toasts())
    }

    pub fn open_all<E: Entity>(&self) -> CollectionBinding<E> {
        CollectionBinding::open_all_with(self.store.clone(), self.toasts())
    }

    pub fn players(&self) -> CollectionBinding<Player> {
        self.open(None)
    }

    pub fn votes(&self, player_id: Option<&str>) -> CollectionBinding<Vote> {
        self.open(player_id)
    }

    pub fn player_likes(&self, player_id: Option<&str>) -> CollectionBinding<Like> {
        let key = player_id.map(|id| LikeSubject::Player.key(id));
        self.open(key.as_deref())
    }

    pub fn post_likes(&self, post_id: Option<&str>) -> CollectionBinding<Like> {
        let key = post_id.map(|id| LikeSubject::Post.key(id));
        self.open(key.as_deref())
    }

    pub fn posts(&self) -> CollectionBinding<Post> {
        self.open(None)
    }

    pub fn comments(&self, post_id: Option<&str>) -> CollectionBinding<Comment> {
        self.open(post_id)
    }

    pub fn messages(&self, conversation_id: Option<&str>) -> CollectionBinding<Message> {
        self.open(conversation_id)
    }

    /// 当前用户的通知
    pub fn notifications(&self) -> CollectionBinding<Notification> {
        self.open(self.user_id())
    }

    /// 当前用户的资料
    pub fn profile(&self) -> CollectionBinding<Profile> {
        self.open(self.user_id())
    }

    pub fn groups(&self) -> CollectionBinding<Group> {
        self.open(None)
    }

    /// 单个球员的组合视图；`players` 可以在多张卡片之间共享
    pub fn player_card(
        &self,
        players: Arc<CollectionBinding<Player>>,
        player_id: &str,
    ) -> PlayerCard {
        PlayerCard::open(
            self.store.clone(),
            players,
            player_id,
            self.user_id(),
            self.toasts(),
        )
    }

    /// 球员列表与排行榜
    pub fn board(&self) -> PlayerBoard {
        PlayerBoard::new(
            Arc::new(self.players()),
            self.open_all(),
            self.open_all(),
            self.user_id(),
        )
    }
}
