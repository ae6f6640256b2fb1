//! 本地回退存储（sqlx / SQLite）
//!
//! 远程存储不可用时使用：所有集合作为一份 JSON 文档保存在固定的 key 下，
//! 每次变更都“读取-修改-整体写回”。支持整份导出、导入（原子替换）与重置。

use crate::pulse::store::document::Document;
use crate::pulse::store::registry::SubscriptionRegistry;
use crate::pulse::store::seed::default_document;
use crate::pulse::store::types::{
    ChangeEvent, ChangeKind, Filter, Order, Row, Subscription, SubscriptionId,
};
use crate::pulse::store::{Store, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row as SqlRow, Sqlite};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 固定的存储 key
pub const STORAGE_KEY: &str = "ballonDor_app_data";

/// 本地回退存储
pub struct LocalStore {
    pool: Pool<Sqlite>,
    /// 串行化“读取-修改-写回”
    write_lock: Mutex<()>,
    registry: Arc<SubscriptionRegistry>,
    defaults: Document,
}

impl LocalStore {
    /// 连接数据库并初始化表结构，缺失的数据使用默认种子
    ///
    /// `db_url` 例如：`sqlite://pulse.db?mode=rwc` 或 `sqlite::memory:`
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_defaults(db_url, default_document()).await
    }

    pub async fn with_defaults(db_url: &str, defaults: Document) -> Result<Self> {
        info!("[LocalStore] 🔗 打开本地存储: {}", db_url);
        // 单连接：内存数据库每个连接都是独立的库
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(db_url)
            .await
            .context(format!("连接SQLite数据库失败: {}", db_url))?;
        Self::init_db_with_connection(&pool).await?;

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            registry: Arc::new(SubscriptionRegistry::new()),
            defaults,
        })
    }

    /// 使用共享连接初始化表结构
    pub async fn init_db_with_connection(db: &Pool<Sqlite>) -> Result<()> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT ''
            )
        "#;
        sqlx::query(sql)
            .execute(db)
            .await
            .context("创建本地存储表失败")?;
        debug!("[LocalStore] 📋 本地存储表初始化完成");
        Ok(())
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// 读取整份文档；读取或解析失败时回退到默认数据
    async fn load(&self) -> Result<Document> {
        let row = sqlx::query("SELECT value FROM local_storage WHERE key = ?")
            .bind(STORAGE_KEY)
            .fetch_optional(&self.pool)
            .await
            .context("读取本地数据失败")?;

        let Some(row) = row else {
            return Ok(self.defaults.clone());
        };
        let text: String = row.get("value");
        let parsed = serde_json::from_str(&text)
            .map_err(anyhow::Error::from)
            .and_then(Document::from_value);
        match parsed {
            Ok(stored) => Ok(Document::merged_over(self.defaults.clone(), stored)),
            Err(e) => {
                warn!("[LocalStore] ⚠️ 本地数据损坏，使用默认数据: {:#}", e);
                Ok(self.defaults.clone())
            }
        }
    }

    /// 整份写回
    async fn save(&self, document: &Document) -> Result<()> {
        let text = serde_json::to_string(&document.to_value()).context("序列化本地数据失败")?;
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(STORAGE_KEY)
        .bind(text)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("保存本地数据失败")?;
        Ok(())
    }

    /// 在写锁内读取、修改并写回
    async fn mutate<T>(&self, apply: impl FnOnce(&mut Document) -> Result<T> + Send) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let result = apply(&mut document)?;
        self.save(&document).await?;
        Ok(result)
    }

    /// 导出整份文档（格式化 JSON）
    pub async fn export_data(&self) -> Result<String> {
        let document = self.load().await?;
        serde_json::to_string_pretty(&document.to_value()).context("导出本地数据失败")
    }

    /// 导入整份文档（原子替换）；内容不是合法文档时返回校验错误且不做任何修改
    pub async fn import_data(&self, json: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| StoreError::Validation(format!("导入数据不是合法 JSON: {}", e)))?;
        let document = Document::from_value(value)?;

        let _guard = self.write_lock.lock().await;
        let previous = self.load().await?;
        self.save(&document).await?;
        info!("[LocalStore] 📥 已导入本地数据");
        // 未出现在导入文档中的集合会回退到默认数据，同样需要通知
        let names: BTreeSet<&str> = previous
            .collection_names()
            .chain(document.collection_names())
            .collect();
        for name in names {
            self.registry.publish(ChangeEvent::reload(name));
        }
        Ok(())
    }

    /// 删除已保存的数据，之后读取到的是默认数据
    pub async fn reset_data(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.load().await?;
        sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(STORAGE_KEY)
            .execute(&self.pool)
            .await
            .context("重置本地数据失败")?;
        info!("[LocalStore] 🧹 已重置本地数据");
        for name in previous.collection_names() {
            self.registry.publish(ChangeEvent::reload(name));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn query(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let document = self.load().await?;
        Ok(document.query(collection, filter, order))
    }

    async fn insert(&self, collection: &str, row: Row) -> Result<Row> {
        let saved = self.mutate(|doc| doc.insert(collection, row)).await?;
        self.registry
            .publish(ChangeEvent::new(collection, ChangeKind::Insert, saved.clone()));
        Ok(saved)
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<Row> {
        let (old, new) = self.mutate(|doc| doc.update(collection, id, patch)).await?;
        let mut event = ChangeEvent::new(collection, ChangeKind::Update, new.clone());
        event.old_row = Some(old);
        self.registry.publish(event);
        Ok(new)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self.mutate(|doc| doc.delete(collection, id)).await?;
        let mut event = ChangeEvent::new(collection, ChangeKind::Delete, Row::new());
        event.old_row = Some(removed);
        self.registry.publish(event);
        Ok(())
    }

    async fn upsert(&self, collection: &str, row: Row, conflict_key: &str) -> Result<Row> {
        let (kind, saved) = self
            .mutate(|doc| doc.upsert(collection, row, conflict_key))
            .await?;
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
    use crate::pulse::binding::CollectionBinding;
    use crate::pulse::models::Player;
    use crate::pulse::test_support::{init_test_logger, wait_for};
    use serde_json::json;

    async fn memory_store() -> Result<LocalStore> {
        init_test_logger();
        LocalStore::new("sqlite::memory:").await
    }

    #[tokio::test]
    async fn fresh_store_serves_seed_data() -> Result<()> {
        let store = memory_store().await?;
        let players = store.query(collections::PLAYERS, None, None).await?;
        assert_eq!(players.len(), 4);
        let milieux = store
            .query(collections::PLAYERS, Some(&Filter::eq("position", "Milieu")), None)
            .await?;
        assert_eq!(milieux.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn mutations_are_persisted_as_one_document() -> Result<()> {
        let store = memory_store().await?;
        let mut vote = Row::new();
        vote.insert("player_id".into(), json!("1"));
        vote.insert("user_id".into(), json!("u1"));
        vote.insert("value".into(), json!(1));
        store.insert(collections::VOTES, vote).await?;

        let exported: serde_json::Value = serde_json::from_str(&store.export_data().await?)?;
        assert_eq!(exported["votes"].as_array().map(Vec::len), Some(1));
        assert_eq!(exported["players"].as_array().map(Vec::len), Some(4));
        Ok(())
    }

    #[tokio::test]
    async fn import_replaces_and_notifies() -> Result<()> {
        let store = memory_store().await?;
        let mut sub = store.subscribe_changes(
            collections::VOTES,
            Some(Filter::eq("player_id", "42")),
        );

        store
            .import_data(r#"{ "votes": [{ "id": "v1", "player_id": "42", "user_id": "u1", "value": 1 }] }"#)
            .await?;
        assert_eq!(sub.recv().await.map(|e| e.kind), Some(ChangeKind::Reload));
        let votes = store.query(collections::VOTES, None, None).await?;
        assert_eq!(votes.len(), 1);
        // 未导入的集合回退到默认数据
        assert_eq!(store.query(collections::PLAYERS, None, None).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn partial_import_refreshes_collections_it_omits() -> Result<()> {
        let store = Arc::new(memory_store().await?);
        store.delete(collections::PLAYERS, "1").await?;
        let players = CollectionBinding::<Player>::open(store.clone(), None);
        players.loaded().await;
        assert_eq!(players.snapshot().len(), 3);

        store.import_data(r#"{ "votes": [] }"#).await?;
        assert_eq!(store.query(collections::PLAYERS, None, None).await?.len(), 4);
        wait_for(&players, |items| items.len() == 4).await;
        Ok(())
    }

    #[tokio::test]
    async fn invalid_import_leaves_data_untouched() -> Result<()> {
        let store = memory_store().await?;
        let before = store.export_data().await?;
        let err = store.import_data("[1, 2, 3]").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Validation(_))
        ));
        assert!(store.import_data("pas du json").await.is_err());
        assert_eq!(store.export_data().await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn reset_restores_defaults() -> Result<()> {
        let store = memory_store().await?;
        store.delete(collections::PLAYERS, "1").await?;
        assert_eq!(store.query(collections::PLAYERS, None, None).await?.len(), 3);
        store.reset_data().await?;
        assert_eq!(store.query(collections::PLAYERS, None, None).await?.len(), 4);
        Ok(())
    }
}
