//! 进程内共享的变更订阅注册表
//!
//! 所有绑定共用一个注册表，每个绑定只增删自己的条目。

use crate::pulse::store::types::{ChangeEvent, Filter, Subscription, SubscriptionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

struct Entry {
    collection: String,
    filter: Option<Filter>,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

/// 订阅注册表
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<SubscriptionId, Entry>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 注册一个订阅
    pub fn subscribe(&self, collection: &str, filter: Option<Filter>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(
            "[Registry] ➕ 注册订阅 #{}: collection={}, filter={:?}",
            id, collection, filter
        );
        self.entries().insert(
            id,
            Entry {
                collection: collection.to_string(),
                filter,
                sender,
            },
        );
        Subscription::new(id, collection, receiver)
    }

    /// 取消订阅，返回条目是否存在
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.entries().remove(&id).is_some();
        if removed {
            debug!("[Registry] ➖ 取消订阅 #{}", id);
        }
        removed
    }

    /// 把事件分发给所有匹配的订阅，返回送达数量
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut entries = self.entries();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, entry) in entries.iter() {
            if entry.collection != event.collection || !event.matches(entry.filter.as_ref()) {
                continue;
            }
            if entry.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*id);
            }
        }

        // 接收端已释放的条目顺手清理
        for id in closed {
            entries.remove(&id);
        }

        debug!(
            "[Registry] 📣 {} {:?} 事件送达 {} 个订阅",
            event.collection, event.kind, delivered
        );
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
