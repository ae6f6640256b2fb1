//! 测试辅助：日志初始化、提示记录器、可编排的存储

use crate::pulse::binding::CollectionBinding;
use crate::pulse::models::Entity;
use crate::pulse::store::{
    Filter, MemoryStore, Order, Row, Store, StoreError, Subscription, SubscriptionId,
};
use crate::pulse::toast::{Toast, ToastListener};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tokio::sync::Notify;

static INIT_LOGGER: Once = Once::new();

pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::EnvFilter;

        // 测试中打开当前 crate 和 sqlx 的 debug
        let filter_layer = EnvFilter::new("info,pulse_sdk_core=debug,sqlx=debug,reqwest=info");

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_test_writer();

        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}

/// 等待绑定快照满足条件（最多 2 秒）
pub async fn wait_for<E: Entity>(binding: &CollectionBinding<E>, check: impl Fn(&[E]) -> bool) {
    let mut changes = binding.changes();
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check(&binding.snapshot()) {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "等待快照更新超时");
}

/// 记录所有提示
#[derive(Default)]
pub struct RecordingToastListener {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingToastListener {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToastListener for RecordingToastListener {
    async fn on_toast(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

/// 包装内存存储：记录提交的更新内容、统计查询次数，并可让查询失败
pub struct RecordingStore {
    inner: MemoryStore,
    fail_queries: AtomicBool,
    hold_queries: AtomicBool,
    release: Notify,
    queries: AtomicUsize,
    subscriptions: AtomicUsize,
    unsubscribes: AtomicUsize,
    updates: Mutex<Vec<(String, Row)>>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_queries: AtomicBool::new(false),
            hold_queries: AtomicBool::new(false),
            release: Notify::new(),
            queries: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// 所有查询都以网络错误失败
    pub fn failing() -> Self {
        let store = Self::new(MemoryStore::seeded());
        store.set_fail_queries(true);
        store
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// 之后的查询停在半路，直到 `release_queries`
    pub fn hold_queries(&self) {
        self.hold_queries.store(true, Ordering::SeqCst);
    }

    /// 放行所有停住的查询
    pub fn release_queries(&self) {
        self.hold_queries.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    /// 等到至少发出 `count` 次查询（最多 2 秒）
    pub async fn wait_for_queries(&self, count: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while self.query_count() < count {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(waited.is_ok(), "等待查询超时");
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// 取消订阅的调用次数
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn submitted_updates(&self) -> Vec<(String, Row)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn query(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        order: Option<&Order>,
    ) -> Result<Vec<Row>> {
        let released = self.release.notified();
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.hold_queries.load(Ordering::SeqCst) {
            released.await;
        }
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Network("connection refused".into()).into());
        }
        self.inner.query(collection, filter, order).await
    }

    async fn insert(&self, collection: &str, row: Row) -> Result<Row> {
        self.inner.insert(collection, row).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<Row> {
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), patch.clone()));
        self.inner.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn upsert(&self, collection: &str, row: Row, conflict_key: &str) -> Result<Row> {
        self.inner.upsert(collection, row, conflict_key).await
    }

    fn subscribe_changes(&self, collection: &str, filter: Option<Filter>) -> Subscription {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe_changes(collection, filter)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.unsubscribe(id)
    }
}
