//! 实时变更通道（WebSocket，Phoenix 协议）
//!
//! 连接后加入 `realtime:pulse` 主题，监听 public schema 的全部表变更，
//! 解析后的事件写入共享的订阅注册表，由注册表按集合和过滤条件分发。

use crate::pulse::store::registry::SubscriptionRegistry;
use crate::pulse::store::types::{ChangeEvent, ChangeKind, Row};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

const TOPIC: &str = "realtime:pulse";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// 构造实时通道地址
pub fn build_url(realtime_url: &str, api_key: &str) -> String {
    format!(
        "{}/websocket?apikey={}&vsn=1.0.0",
        realtime_url.trim_end_matches('/'),
        api_key
    )
}

fn join_frame() -> String {
    json!({
        "topic": TOPIC,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [{ "event": "*", "schema": "public" }]
            }
        },
        "ref": "1"
    })
    .to_string()
}

fn heartbeat_frame(seq: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": seq.to_string()
    })
    .to_string()
}

fn object(value: Option<&Value>) -> Option<Row> {
    match value {
        Some(Value::Object(map)) if !map.is_empty() => Some(map.clone()),
        _ => None,
    }
}

/// 解析一条实时帧；非变更帧（回复、心跳、系统消息）返回 None
pub fn parse_change_event(text: &str) -> Option<ChangeEvent> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame.get("event")?.as_str()? != "postgres_changes" {
        return None;
    }
    let data = frame.get("payload")?.get("data")?;
    let table = data.get("table")?.as_str()?;
    let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;

    let record = object(data.get("record")).unwrap_or_default();
    let mut event = ChangeEvent::new(table, kind, record);
    event.old_row = object(data.get("old_record"));
    Some(event)
}

/// 实时通道客户端，持有后台连接任务
pub struct RealtimeClient {
    task: JoinHandle<()>,
}

impl RealtimeClient {
    /// 启动后台任务；断线后间隔重连，直到被丢弃
    pub fn spawn(realtime_url: &str, api_key: &str, registry: Arc<SubscriptionRegistry>) -> Self {
        let url = build_url(realtime_url, api_key);
        let task = tokio::spawn(async move {
            loop {
                match run_connection(&url, &registry).await {
                    Ok(()) => warn!("[Realtime] 🔌 连接已关闭"),
                    Err(e) => error!("[Realtime] ❌ 连接错误: {:#}", e),
                }
                info!(
                    "[Realtime] 🔄 {} 秒后重连",
                    RECONNECT_DELAY.as_secs()
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_connection(url: &str, registry: &SubscriptionRegistry) -> Result<()> {
    info!("[Realtime] 🔗 连接实时通道");
    let (ws_stream, response) = connect_async(url)
        .await
        .context("实时通道连接失败")?;
    info!("[Realtime] ✅ WebSocket 连接成功, 状态: {}", response.status());

    let (write, mut read) = ws_stream.split();
    let writer = Arc::new(Mutex::new(write));

    writer
        .lock()
        .await
        .send(WsMessage::Text(join_frame()))
        .await
        .context("加入频道失败")?;

    // 启动心跳
    let writer_for_heartbeat = writer.clone();
    let heartbeat = tokio::spawn(async move {
        let mut ticker = interval(HEARTBEAT_INTERVAL);
        let mut seq = 1u64;
        loop {
            ticker.tick().await;
            seq += 1;
            let mut w = writer_for_heartbeat.lock().await;
            if w.send(WsMessage::Text(heartbeat_frame(seq))).await.is_err() {
                break;
            }
        }
    });

    let result: Result<()> = async {
        while let Some(message) = read.next().await {
            match message.context("读取实时消息失败")? {
                WsMessage::Text(text) => match parse_change_event(&text) {
                    Some(event) => {
                        debug!(
                            "[Realtime] 📥 {} {:?}",
                            event.collection, event.kind
                        );
                        registry.publish(event);
                    }
                    None => debug!("[Realtime] 忽略消息: {}", text),
                },
                WsMessage::Ping(payload) => {
                    writer.lock().await.send(WsMessage::Pong(payload)).await?;
                }
                WsMessage::Close(frame) => {
                    info!("[Realtime] 服务器关闭连接: {:?}", frame);
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    heartbeat.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_postgres_change_frames() {
        let text = r#"{
            "topic": "realtime:pulse",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "table": "votes",
                    "type": "DELETE",
                    "record": {},
                    "old_record": { "id": "v1", "player_id": "3" }
                }
            },
            "ref": null
        }"#;
        let event = parse_change_event(text).expect("change frame");
        assert_eq!(event.collection, "votes");
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.row.is_empty());
        assert_eq!(
            event.old_row.as_ref().and_then(|r| r.get("player_id")),
            Some(&json!("3"))
        );
    }

    #[test]
    fn ignores_replies_and_unknown_frames() {
        assert!(parse_change_event(r#"{"topic":"phoenix","event":"phx_reply","payload":{}}"#).is_none());
        assert!(parse_change_event("not json").is_none());
        assert!(parse_change_event(
            r#"{"event":"postgres_changes","payload":{"data":{"table":"votes","type":"TRUNCATE"}}}"#
        )
        .is_none());
    }

    #[test]
    fn url_carries_api_key() {
        assert_eq!(
            build_url("wss://demo.example.co/realtime/v1/", "anon"),
            "wss://demo.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }
}
