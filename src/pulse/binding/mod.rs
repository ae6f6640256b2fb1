//! 远程集合绑定
//!
//! 打开时先注册变更订阅，再在后台任务中完成首次拉取；此后每个相关变更都触发一次整体重新拉取，
//! 用存储端的结果替换整个快照。本地的新增、更新、删除在存储端确认成功后立即反映到快照中，
//! 不等待变更通知。

mod comments;
mod groups;
mod likes;
mod messages;
mod notifications;
mod posts;
mod profiles;
mod votes;

use crate::pulse::error::{handle, with_error_handling, AppError};
use crate::pulse::models::{Entity, Validate};
use crate::pulse::serialization::{from_row, strip_nulls, to_row};
use crate::pulse::store::{collections, Filter, Row, Store, Subscription, SubscriptionId};
use crate::pulse::toast::ToastListener;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 绑定范围
#[derive(Debug, Clone, PartialEq)]
enum Scope {
    /// 作用域实体缺少作用域键：不拉取、不订阅
    Inert,
    Scoped { key: String, filter: Filter },
    All,
}

struct BindingState<E> {
    items: Vec<E>,
    loading: bool,
    error: Option<AppError>,
    closed: bool,
}

struct BindingCore<E: Entity> {
    store: Arc<dyn Store>,
    scope: Scope,
    state: Mutex<BindingState<E>>,
    /// 每次状态变化加一
    revision: watch::Sender<u64>,
    toasts: Option<Arc<dyn ToastListener>>,
    label: String,
}

impl<E: Entity> BindingCore<E> {
    fn state(&self) -> MutexGuard<'_, BindingState<E>> {
        lock(&self.state)
    }

    fn filter(&self) -> Option<&Filter> {
        match &self.scope {
            Scope::Scoped { filter, .. } => Some(filter),
            _ => None,
        }
    }

    fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// 修改状态并通知观察者；绑定关闭后不再修改
    fn apply(&self, change: impl FnOnce(&mut BindingState<E>)) -> bool {
        {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            change(&mut state);
        }
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
        true
    }

    /// 拉取整个作用域并替换快照；失败时保留旧快照
    async fn fetch(&self) {
        let order = E::ORDER;
        let result = self
            .store
            .query(E::COLLECTION, self.filter(), order.as_ref())
            .await;

        match result {
            Ok(rows) => {
                let total = rows.len();
                let items: Vec<E> = rows
                    .into_iter()
                    .filter_map(|row| match from_row::<E>(row) {
                        Ok(item) => Some(item),
                        Err(e) => {
                            warn!("[Binding/{}] ⚠️ 跳过无法解析的记录: {:#}", self.label, e);
                            None
                        }
                    })
                    .collect();
                debug!(
                    "[Binding/{}] ✅ 拉取完成: {}/{} 条",
                    self.label,
                    items.len(),
                    total
                );
                self.apply(|state| {
                    state.items = items;
                    state.loading = false;
                    state.error = None;
                });
            }
            Err(err) => {
                let app_error = handle(&err, &format!("加载 {}", self.label));
                self.apply(|state| {
                    state.loading = false;
                    state.error = Some(app_error);
                });
            }
        }
    }
}

/// 后台任务：首次拉取，然后每收到一批变更就重新拉取
async fn watch_changes<E: Entity>(core: Arc<BindingCore<E>>, mut subscription: Subscription) {
    core.fetch().await;

    while let Some(event) = subscription.recv().await {
        // 合并已经到达的事件，只拉取一次
        let mut merged = 1;
        while subscription.try_recv().is_some() {
            merged += 1;
        }
        if core.is_closed() {
            break;
        }
        debug!(
            "[Binding/{}] 📥 收到变更 {:?}（{} 个），重新拉取",
            core.label, event.kind, merged
        );
        core.fetch().await;
    }
}

/// 一个集合（或集合中一个作用域）的响应式快照
///
/// 必须在 Tokio 运行时中打开。丢弃时自动关闭。
pub struct CollectionBinding<E: Entity> {
    core: Arc<BindingCore<E>>,
    subscription: Mutex<Option<SubscriptionId>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Entity> CollectionBinding<E> {
    /// 打开绑定
    ///
    /// 带作用域字段的实体（如 votes 的 `player_id`）只跟踪 `scope_key` 对应的行；
    /// `scope_key` 为空时绑定不做任何事（空快照、不在加载中）。
    /// 没有作用域字段的实体忽略 `scope_key`，跟踪整个集合。
    pub fn open(store: Arc<dyn Store>, scope_key: Option<&str>) -> Self {
        Self::open_with(store, scope_key, None)
    }

    pub fn open_with(
        store: Arc<dyn Store>,
        scope_key: Option<&str>,
        toasts: Option<Arc<dyn ToastListener>>,
    ) -> Self {
        let scope = match (E::SCOPE_FIELD, scope_key.filter(|k| !k.is_empty())) {
            (Some(field), Some(key)) => Scope::Scoped {
                key: key.to_string(),
                filter: Filter::eq(field, key),
            },
            (Some(_), None) => Scope::Inert,
            (None, _) => Scope::All,
        };
        Self::start(store, scope, toasts)
    }

    /// 不按作用域过滤，跟踪整个集合（例如排行榜需要全部投票）
    pub fn open_all(store: Arc<dyn Store>) -> Self {
        Self::start(store, Scope::All, None)
    }

    pub fn open_all_with(store: Arc<dyn Store>, toasts: Option<Arc<dyn ToastListener>>) -> Self {
        Self::start(store, Scope::All, toasts)
    }

    fn start(
        store: Arc<dyn Store>,
        scope: Scope,
        toasts: Option<Arc<dyn ToastListener>>,
    ) -> Self {
        let label = match &scope {
            Scope::Scoped { key, filter } => {
                format!("{}/{}={}", E::COLLECTION, filter.field, key)
            }
            _ => E::COLLECTION.to_string(),
        };
        let inert = scope == Scope::Inert;
        let (revision, _) = watch::channel(0u64);
        let core = Arc::new(BindingCore {
            store,
            scope,
            state: Mutex::new(BindingState {
                items: Vec::new(),
                loading: !inert,
                error: None,
                closed: false,
            }),
            revision,
            toasts,
            label,
        });

        if inert {
            debug!("[Binding/{}] 缺少作用域键，跳过拉取与订阅", core.label);
            return Self {
                core,
                subscription: Mutex::new(None),
                task: Mutex::new(None),
            };
        }

        let subscription = core
            .store
            .subscribe_changes(E::COLLECTION, core.filter().cloned());
        let subscription_id = subscription.id();
        info!(
            "[Binding/{}] 🔗 打开绑定（订阅 #{}）",
            core.label, subscription_id
        );
        let task = tokio::spawn(watch_changes(core.clone(), subscription));

        Self {
            core,
            subscription: Mutex::new(Some(subscription_id)),
            task: Mutex::new(Some(task)),
        }
    }

    /// 当前快照（存储顺序）
    pub fn snapshot(&self) -> Vec<E> {
        self.core.state().items.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.core.state().loading
    }

    /// 最近一次拉取的错误；成功拉取后清除
    pub fn error(&self) -> Option<AppError> {
        self.core.state().error.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// 作用域键（例如投票绑定的球员 id）
    pub fn scope_key(&self) -> Option<&str> {
        match &self.core.scope {
            Scope::Scoped { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn find(&self, id: &str) -> Option<E> {
        self.core
            .state()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// 状态变化信号：快照、加载状态或错误每次变化时更新
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.core.revision.subscribe()
    }

    /// 等待首次拉取结束
    pub async fn loaded(&self) {
        let mut changes = self.changes();
        while self.is_loading() && !self.is_closed() {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// 立即重新拉取
    pub async fn refresh(&self) {
        if self.core.scope == Scope::Inert || self.is_closed() {
            return;
        }
        self.core.fetch().await;
    }

    fn context(&self, operation: &str) -> String {
        format!("{} {}", self.core.label, operation)
    }

    fn toasts(&self) -> Option<&Arc<dyn ToastListener>> {
        self.core.toasts.as_ref()
    }

    /// 缺少作用域键的绑定不能修改数据
    fn require_scope(&self, operation: &str) {
        if self.core.scope == Scope::Inert {
            panic!(
                "{}.{}: 绑定打开时缺少作用域键 {}，不能修改数据",
                E::COLLECTION,
                operation,
                E::SCOPE_FIELD.unwrap_or("")
            );
        }
    }

    /// 作用域键；领域操作需要它来填充记录
    pub(crate) fn expect_scope_key(&self, operation: &str) -> String {
        match &self.core.scope {
            Scope::Scoped { key, .. } => key.clone(),
            _ => panic!(
                "{}.{}: 需要按 {} 打开的绑定",
                E::COLLECTION,
                operation,
                E::SCOPE_FIELD.unwrap_or("作用域")
            ),
        }
    }

    /// 以统一的方式报告一个业务错误
    pub(crate) async fn fail<T>(&self, operation: &str, error: AppError) -> Result<T, AppError> {
        with_error_handling(&self.context(operation), self.toasts(), async {
            Err::<T, anyhow::Error>(error.into())
        })
        .await
    }

    /// 在快照中查找记录，找不到时报告 NOT_FOUND
    pub(crate) async fn require_item(&self, operation: &str, id: &str) -> Result<E, AppError> {
        match self.find(id) {
            Some(item) => Ok(item),
            None => {
                self.fail(
                    operation,
                    AppError::not_found("Élément introuvable")
                        .with_details(format!("{}/{}", E::COLLECTION, id)),
                )
                .await
            }
        }
    }

    fn in_scope(&self, row: &Row) -> bool {
        self.core.filter().map_or(true, |filter| filter.matches(row))
    }

    /// 把存储端确认的新记录放入快照；已存在同 id 的记录时替换
    fn absorb_inserted(&self, entity: &E, row: &Row) {
        if !self.in_scope(row) {
            return;
        }
        let entity = entity.clone();
        self.core.apply(|state| {
            match state.items.iter_mut().find(|item| item.id() == entity.id()) {
                Some(existing) => *existing = entity,
                None if E::PREPEND => state.items.insert(0, entity),
                None => state.items.push(entity),
            }
        });
    }

    fn absorb_updated(&self, id: &str, entity: &E, row: &Row) {
        let still_in_scope = self.in_scope(row);
        let entity = entity.clone();
        self.core.apply(|state| {
            if still_in_scope {
                if let Some(existing) = state.items.iter_mut().find(|item| item.id() == id) {
                    *existing = entity;
                }
            } else {
                state.items.retain(|item| item.id() != id);
            }
        });
    }

    async fn insert_row(&self, draft: &E::Draft) -> anyhow::Result<(E, Row)> {
        draft.validate()?;
        let row = to_row(draft)?;
        let saved = self.core.store.insert(E::COLLECTION, row).await?;
        let entity = from_row::<E>(saved.clone())?;
        Ok((entity, saved))
    }

    /// 新建记录；成功后立即出现在快照中
    pub async fn create(&self, draft: E::Draft) -> Result<E, AppError> {
        self.require_scope("create");
        let (entity, row) =
            with_error_handling(&self.context("create"), self.toasts(), self.insert_row(&draft))
                .await?;
        self.absorb_inserted(&entity, &row);
        debug!("[Binding/{}] ➕ 新建 {}", self.core.label, entity.id());
        Ok(entity)
    }

    /// 部分更新；值为 null 的字段不会提交
    pub async fn update(&self, id: &str, patch: E::Patch) -> Result<E, AppError> {
        self.require_scope("update");
        let (entity, row) = with_error_handling(&self.context("update"), self.toasts(), async {
            let patch = strip_nulls(to_row(&patch)?);
            if patch.is_empty() {
                return Err(AppError::validation("Aucune modification à enregistrer").into());
            }
            let saved = self.core.store.update(E::COLLECTION, id, patch).await?;
            let entity = from_row::<E>(saved.clone())?;
            Ok((entity, saved))
        })
        .await?;
        self.absorb_updated(id, &entity, &row);
        debug!("[Binding/{}] ✏️ 更新 {}", self.core.label, id);
        Ok(entity)
    }

    /// 删除；成功后从快照中移除
    pub async fn remove(&self, id: &str) -> Result<(), AppError> {
        self.require_scope("remove");
        with_error_handling(
            &self.context("remove"),
            self.toasts(),
            self.core.store.delete(E::COLLECTION, id),
        )
        .await?;
        self.core
            .apply(|state| state.items.retain(|item| item.id() != id));
        debug!("[Binding/{}] ➖ 删除 {}", self.core.label, id);
        Ok(())
    }

    /// 按集合主键插入或更新
    pub async fn upsert(&self, draft: E::Draft) -> Result<E, AppError> {
        self.require_scope("upsert");
        let conflict_key = collections::key_field(E::COLLECTION);
        let (entity, row) = with_error_handling(&self.context("upsert"), self.toasts(), async {
            draft.validate()?;
            let row = to_row(&draft)?;
            let saved = self
                .core
                .store
                .upsert(E::COLLECTION, row, conflict_key)
                .await?;
            let entity = from_row::<E>(saved.clone())?;
            Ok((entity, saved))
        })
        .await?;
        self.absorb_inserted(&entity, &row);
        Ok(entity)
    }

    /// 释放订阅并停止后台任务，丢弃快照；可重复调用
    pub fn close(&self) {
        let was_closed = {
            let mut state = self.core.state();
            state.items.clear();
            state.loading = false;
            std::mem::replace(&mut state.closed, true)
        };
        if let Some(id) = lock(&self.subscription).take() {
            self.core.store.unsubscribe(id);
        }
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        if !was_closed {
            info!("[Binding/{}] 🔌 关闭绑定", self.core.label);
            self.core
                .revision
                .send_modify(|revision| *revision = revision.wrapping_add(1));
        }
    }
}

impl<E: Entity> Drop for CollectionBinding<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::error::ErrorKind;
    use crate::pulse::models::{
        Message, MessageDraft, MessageKind, MessagePatch, MessageStatus, Player, Post, PostDraft,
        Vote, VoteDraft,
    };
    use crate::pulse::store::{ChangeKind, MemoryStore};
    use crate::pulse::test_support::{
        init_test_logger, wait_for, RecordingStore, RecordingToastListener,
    };
    use serde_json::json;

    fn recording() -> Arc<RecordingStore> {
        init_test_logger();
        Arc::new(RecordingStore::new(MemoryStore::seeded()))
    }

    fn message_draft(content: &str) -> MessageDraft {
        MessageDraft {
            conversation_id: "c1".into(),
            sender_id: "user-123".into(),
            content: content.into(),
            kind: MessageKind::Text,
            status: MessageStatus::Sent,
        }
    }

    #[tokio::test]
    async fn open_without_scope_key_is_inert() {
        let store = recording();
        let votes = CollectionBinding::<Vote>::open(store.clone(), None);

        assert!(votes.snapshot().is_empty());
        assert!(!votes.is_loading());
        assert!(votes.error().is_none());
        votes.loaded().await;
        votes.refresh().await;
        assert_eq!(store.query_count(), 0);
        assert_eq!(store.subscription_count(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "player_id")]
    async fn mutating_an_inert_binding_panics() {
        let store = recording();
        let votes = CollectionBinding::<Vote>::open(store, None);
        let _ = votes
            .create(VoteDraft {
                player_id: "1".into(),
                user_id: "user-123".into(),
                value: 1,
            })
            .await;
    }

    #[tokio::test]
    async fn initial_fetch_populates_in_store_order() {
        let store = recording();
        let posts = CollectionBinding::<Post>::open(store.clone(), None);
        assert!(posts.is_loading());
        posts.loaded().await;

        let ids: Vec<_> = posts.snapshot().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(!posts.is_loading());
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn created_entity_is_visible_immediately() {
        let store = recording();
        let posts = CollectionBinding::<Post>::open(store.clone(), None);
        posts.loaded().await;

        let created = posts
            .create(PostDraft {
                user_id: "user-123".into(),
                content: "Quelle finale !".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let snapshot = posts.snapshot();
        assert_eq!(snapshot[0].id, created.id);
        assert_eq!(snapshot.len(), 3);
    }

    #[tokio::test]
    async fn invalid_draft_leaves_snapshot_unchanged() {
        let store = recording();
        let recorder = Arc::new(RecordingToastListener::default());
        let toasts: Arc<dyn ToastListener> = recorder.clone();
        let posts = CollectionBinding::<Post>::open_with(store.clone(), None, Some(toasts));
        posts.loaded().await;

        let err = posts
            .create(PostDraft {
                user_id: "user-123".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(posts.snapshot().len(), 2);
        assert_eq!(recorder.toasts().len(), 1);
    }

    #[tokio::test]
    async fn update_submits_only_present_fields() {
        let store = recording();
        let messages = CollectionBinding::<Message>::open(store.clone(), Some("c1"));
        messages.loaded().await;
        let sent = messages.create(message_draft("Salut")).await.unwrap();

        let updated = messages
            .update(
                &sent.id,
                MessagePatch {
                    content: None,
                    status: Some(MessageStatus::Read),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, MessageStatus::Read);
        assert_eq!(updated.content, "Salut");

        let submitted = store.submitted_updates();
        assert_eq!(submitted.len(), 1);
        let keys: Vec<_> = submitted[0].1.keys().cloned().collect();
        assert_eq!(keys, vec!["status".to_string()]);
        assert_eq!(
            messages.find(&sent.id).map(|m| m.status),
            Some(MessageStatus::Read)
        );
    }

    #[tokio::test]
    async fn empty_patch_is_a_validation_error() {
        let store = recording();
        let messages = CollectionBinding::<Message>::open(store.clone(), Some("c1"));
        let sent = messages.create(message_draft("Salut")).await.unwrap();

        let err = messages
            .update(&sent.id, MessagePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.submitted_updates().is_empty());
    }

    #[tokio::test]
    async fn removed_entity_never_reappears() {
        let store = recording();
        let players = CollectionBinding::<Player>::open(store.clone(), None);
        players.loaded().await;

        players.remove("2").await.unwrap();
        assert!(players.snapshot().iter().all(|p| p.id != "2"));
        players.refresh().await;
        assert!(players.snapshot().iter().all(|p| p.id != "2"));
        assert_eq!(players.snapshot().len(), 3);

        let err = players.remove("2").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn close_twice_unsubscribes_once() {
        let store = recording();
        let votes = CollectionBinding::<Vote>::open(store.clone(), Some("1"));
        votes.loaded().await;

        votes.close();
        votes.close();
        assert!(votes.is_closed());
        drop(votes);
        assert_eq!(store.subscription_count(), 1);
        assert_eq!(store.unsubscribe_count(), 1);
        assert!(store.inner().registry().is_empty());
    }

    #[tokio::test]
    async fn closed_binding_ignores_late_results() {
        let store = recording();
        let votes = CollectionBinding::<Vote>::open(store.clone(), Some("1"));
        votes.close();

        let vote = votes
            .create(VoteDraft {
                player_id: "1".into(),
                user_id: "user-123".into(),
                value: 1,
            })
            .await
            .unwrap();
        assert!(!vote.id.is_empty());
        assert!(votes.snapshot().is_empty());
        votes.refresh().await;
        assert!(votes.snapshot().is_empty());
    }

    #[tokio::test]
    async fn fetch_in_flight_at_close_is_discarded() {
        let store = recording();
        let mut row = Row::new();
        row.insert("player_id".into(), json!("1"));
        row.insert("user_id".into(), json!("user-456"));
        row.insert("value".into(), json!(1));
        store.inner().insert("votes", row).await.unwrap();

        store.hold_queries();
        let votes = CollectionBinding::<Vote>::open(store.clone(), Some("1"));
        store.wait_for_queries(1).await;
        assert!(votes.is_loading());

        tokio::join!(votes.refresh(), async {
            store.wait_for_queries(2).await;
            votes.close();
            store.release_queries();
        });

        assert!(votes.is_closed());
        assert!(votes.snapshot().is_empty());
        assert!(!votes.is_loading());
        assert!(votes.error().is_none());
    }

    #[tokio::test]
    async fn network_failure_on_first_fetch_is_reported() {
        init_test_logger();
        let store = Arc::new(RecordingStore::failing());
        let players = CollectionBinding::<Player>::open(store.clone(), None);
        players.loaded().await;

        let error = players.error().expect("fetch error");
        assert_eq!(error.kind, ErrorKind::Network);
        assert!(players.snapshot().is_empty());
        assert!(!players.is_loading());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_good_snapshot() {
        let store = recording();
        let players = CollectionBinding::<Player>::open(store.clone(), None);
        players.loaded().await;

        store.set_fail_queries(true);
        players.refresh().await;
        assert_eq!(players.snapshot().len(), 4);
        assert_eq!(players.error().map(|e| e.kind), Some(ErrorKind::Network));

        store.set_fail_queries(false);
        players.refresh().await;
        assert!(players.error().is_none());
    }

    #[tokio::test]
    async fn external_changes_trigger_refetch() {
        let store = recording();
        let votes = CollectionBinding::<Vote>::open(store.clone(), Some("1"));
        votes.loaded().await;
        assert!(votes.snapshot().is_empty());

        // 另一个客户端写入
        let mut row = Row::new();
        row.insert("player_id".into(), json!("1"));
        row.insert("user_id".into(), json!("user-456"));
        row.insert("value".into(), json!(1));
        store.inner().insert("votes", row).await.unwrap();

        wait_for(&votes, |items| items.len() == 1).await;
        assert_eq!(votes.snapshot()[0].user_id, "user-456");

        // 其他作用域的变更不会送达
        let mut other = store.inner().subscribe_changes("votes", None);
        let mut row = Row::new();
        row.insert("player_id".into(), json!("2"));
        row.insert("user_id".into(), json!("user-456"));
        let queries = store.query_count();
        store.inner().insert("votes", row).await.unwrap();
        assert_eq!(other.recv().await.map(|e| e.kind), Some(ChangeKind::Insert));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.query_count(), queries);
        assert_eq!(votes.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_rows_are_skipped() {
        let store = recording();
        let mut broken = Row::new();
        broken.insert("id".into(), json!("99"));
        broken.insert("position".into(), json!("Gardien"));
        store.inner().insert("players", broken).await.unwrap();

        let players = CollectionBinding::<Player>::open(store.clone(), None);
        players.loaded().await;
        assert_eq!(players.snapshot().len(), 4);
        assert!(players.error().is_none());
    }
}
