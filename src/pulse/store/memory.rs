//! 进程内存储，开发与测试使用

use crate::pulse::store::document::Document;
use crate::pulse::store::registry::SubscriptionRegistry;
use crate::pulse::store::seed::default_document;
use crate::pulse::store::types::{
    ChangeEvent, ChangeKind, Filter, Order, Row, Subscription, SubscriptionId,
};
use crate::pulse::store::Store;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 内存存储
pub struct MemoryStore {
    document: Mutex<Document>,
    registry: Arc<SubscriptionRegistry>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// 空存储
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    /// 带默认数据的存储
    pub fn seeded() -> Self {
        Self::with_document(default_document())
    }

    pub fn with_document(document: Document) -> Self {
        Self {
            document: Mutex::new(document),
            registry: Arc::new(SubscriptionRegistry::new()),
        }
    }

    fn document(&self) -> MutexGuard<'_, Document> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 共享的订阅注册表
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// 当前文档的拷贝
    pub fn document_snapshot(&self) -> Document {
        self.document().clone()
    }

    /// 整体替换某个集合并通知订阅者（模拟外部写入）
    pub fn replace_collection(&self, collection: &str, rows: Vec<Row>) {
        self.document().set_rows(collection, rows);
        self.registry.publish(ChangeEvent::reload(collection));
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn query(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let rows = self.document().query(collection, filter, order);
        debug!("[MemoryStore] 查询 {}，共 {} 行", collection, rows.len());
        Ok(rows)
    }

    async fn insert(&self, collection: &str, row: Row) -> Result<Row> {
        let saved = self.document().insert(collection, row)?;
        self.registry
            .publish(ChangeEvent::new(collection, ChangeKind::Insert, saved.clone()));
        Ok(saved)
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<Row> {
        let (old, new) = self.document().update(collection, id, patch)?;
        let mut event = ChangeEvent::new(collection, ChangeKind::Update, new.clone());
        event.old_row = Some(old);
        self.registry.publish(event);
        Ok(new)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self.document().delete(collection, id)?;
        let mut event = ChangeEvent::new(collection, ChangeKind::Delete, Row::new());
        event.old_row = Some(removed);
        self.registry.publish(event);
        Ok(())
    }

    async fn upsert(&self, collection: &str, row: Row, conflict_key: &str) -> Result<Row> {
        let (kind, saved) = self.document().upsert(collection, row, conflict_key)?;
        self.registry
            .publish(ChangeEvent::new(collection, kind, saved.clone()));
        Ok(saved)
    }

    fn subscribe_changes(&self, collection: &str, filter: Option<Filter>) -> Subscription {
        self.registry.subscribe(collection, filter)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::store::collections;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[tokio::test]
    async fn mutations_publish_scoped_events() -> Result<()> {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_changes(
            collections::MESSAGES,
            Some(Filter::eq("conversation_id", "c1")),
        );

        let saved = store
            .insert(
                collections::MESSAGES,
                row(json!({ "conversation_id": "c1", "sender_id": "u1", "content": "salut" })),
            )
            .await?;
        store
            .insert(
                collections::MESSAGES,
                row(json!({ "conversation_id": "c2", "sender_id": "u1", "content": "autre" })),
            )
            .await?;
        let id = saved["id"].as_str().unwrap_or_default().to_string();
        store.delete(collections::MESSAGES, &id).await?;

        assert_eq!(sub.recv().await.map(|e| e.kind), Some(ChangeKind::Insert));
        assert_eq!(sub.recv().await.map(|e| e.kind), Some(ChangeKind::Delete));
        assert!(sub.try_recv().is_none());

        assert!(store.unsubscribe(sub.id()));
        assert!(!store.unsubscribe(sub.id()));
        Ok(())
    }

    #[tokio::test]
    async fn seeded_store_orders_posts() -> Result<()> {
        let store = MemoryStore::seeded();
        let posts = store
            .query(collections::POSTS, None, Some(&Order::desc("created_at")))
            .await?;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0]["id"], json!("1"));
        Ok(())
    }
}
