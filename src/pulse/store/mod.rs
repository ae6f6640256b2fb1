//! 存储模块
//!
//! 绑定层只依赖 [`Store`] 接口；具体实现（内存、本地回退、远程）在启动时按配置选择。

pub mod document;
pub mod local;
pub mod memory;
pub mod registry;
pub mod remote;
pub mod seed;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

// 重新导出主要类型和函数
pub use document::Document;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use registry::SubscriptionRegistry;
pub use remote::RemoteStore;
pub use types::{
    collections, is_conflict, ChangeEvent, ChangeKind, Filter, Order, Row, StoreError,
    Subscription, SubscriptionId,
};

/// 集合存储接口（查询 / 变更 / 变更订阅）
///
/// 错误以 `anyhow::Error` 返回，根因为 [`StoreError`]，由绑定层统一归类。
#[async_trait]
pub trait Store: Send + Sync {
    /// 查询集合，可选等值过滤与排序
    async fn query(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>>;

    /// 插入一行，返回存储端补齐后的行
    async fn insert(&self, collection: &str, row: Row) -> Result<Row>;

    /// 按主键部分更新
    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<Row>;

    /// 按主键删除
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// 按冲突键插入或更新
    async fn upsert(&self, collection: &str, row: Row, conflict_key: &str) -> Result<Row>;

    /// 订阅集合变更（可选过滤）
    fn subscribe_changes(&self, collection: &str, filter: Option<Filter>) -> Subscription;

    /// 取消订阅；返回订阅是否仍然存在
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
