//! 远程托管存储：HTTP API 读写 + 实时通道推送变更

pub mod api;
pub mod realtime;

use crate::pulse::store::registry::SubscriptionRegistry;
use crate::pulse::store::types::{
    collections, ChangeEvent, ChangeKind, Filter, Order, Row, Subscription, SubscriptionId,
};
use crate::pulse::store::Store;
use anyhow::{Context, Result};
use api::RestApi;
use async_trait::async_trait;
use realtime::RealtimeClient;
use std::sync::Arc;
use tracing::info;

pub use api::status_error;
pub use realtime::parse_change_event;

/// 远程存储配置
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub api_base_url: String,
    /// 为空时不启动实时通道，订阅只会收到本进程发布的变更
    pub realtime_url: Option<String>,
    pub api_key: String,
}

/// 远程存储
pub struct RemoteStore {
    api: RestApi,
    registry: Arc<SubscriptionRegistry>,
    realtime: Option<RealtimeClient>,
}

impl RemoteStore {
    /// 创建带认证头的 HTTP 客户端并（可选）启动实时通道
    pub fn connect(config: RemoteStoreConfig) -> Result<Self> {
        info!("[RemoteStore] 🔗 连接远程存储: {}", config.api_base_url);

        // apikey / Authorization 通过 default_headers 自动添加
        let http_client = reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::HeaderName::from_static("apikey"),
                    reqwest::header::HeaderValue::from_str(&config.api_key)
                        .context("无效的 api key")?,
                );
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                        .context("无效的 api key")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let realtime = config
            .realtime_url
            .as_deref()
            .map(|url| RealtimeClient::spawn(url, &config.api_key, registry.clone()));

        Ok(Self {
            api: RestApi::new(http_client, config.api_base_url),
            registry,
            realtime,
        })
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn has_realtime(&self) -> bool {
        self.realtime.as_ref().is_some_and(RealtimeClient::is_running)
    }

    /// 没有实时通道时，由本进程发布自己的变更；有实时通道时由服务器推送
    fn publish_local(&self, event: ChangeEvent) {
        if self.realtime.is_none() {
            self.registry.publish(event);
        }
    }
}

#[async_trait]
impl Store for RemoteStore {
    async fn query(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        self.api.select(collection, filter, order).await
    }

    async fn insert(&self, collection: &str, row: Row) -> Result<Row> {
        let saved = self.api.insert(collection, &row).await?;
        self.publish_local(ChangeEvent::new(collection, ChangeKind::Insert, saved.clone()));
        Ok(saved)
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<Row> {
        let saved = self
            .api
            .update(collection, collections::key_field(collection), id, &patch)
            .await?;
        self.publish_local(ChangeEvent::new(collection, ChangeKind::Update, saved.clone()));
        Ok(saved)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self
            .api
            .delete(collection, collections::key_field(collection), id)
            .await?;
        let mut event = ChangeEvent::new(collection, ChangeKind::Delete, Row::new());
        event.old_row = Some(removed);
        self.publish_local(event);
        Ok(())
    }

    async fn upsert(&self, collection: &str, row: Row, conflict_key: &str) -> Result<Row> {
        let saved = self.api.upsert(collection, &row, conflict_key).await?;
        // 服务器不区分插入还是更新，按更新通知
        self.publish_local(ChangeEvent::new(collection, ChangeKind::Update, saved.clone()));
        Ok(saved)
    }

    fn subscribe_changes(&self, collection: &str, filter: Option<Filter>) -> Subscription {
        self.registry.subscribe(collection, filter)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }
}
