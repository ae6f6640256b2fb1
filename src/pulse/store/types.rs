//! 存储接口的公共数据结构

use crate::pulse::error::{AppError, ErrorKind};
use futures_util::Stream;
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::mpsc;

/// 一行记录（JSON 对象）
pub type Row = serde_json::Map<String, Value>;

/// 集合名称
pub mod collections {
    pub const PLAYERS: &str = "players";
    pub const VOTES: &str = "votes";
    pub const LIKES: &str = "likes";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const MESSAGES: &str = "messages";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const PROFILES: &str = "profiles";
    pub const GROUPS: &str = "groups";

    pub const ALL: [&str; 9] = [
        PLAYERS,
        VOTES,
        LIKES,
        POSTS,
        COMMENTS,
        MESSAGES,
        NOTIFICATIONS,
        PROFILES,
        GROUPS,
    ];

    /// 集合的主键字段（profiles 与用户一一对应，以 user_id 为键）
    pub fn key_field(collection: &str) -> &'static str {
        match collection {
            PROFILES => "user_id",
            _ => "id",
        }
    }

    /// 存储端强制的唯一约束
    pub fn unique_fields(collection: &str) -> &'static [&'static str] {
        match collection {
            LIKES => &["subject_id", "user_id"],
            PROFILES => &["user_id"],
            _ => &[],
        }
    }
}

/// 把 JSON 值转换为可比较的键（字符串和数字统一为字符串）
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 等值过滤条件：`field = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        match (row.get(&self.field), key_string(&self.value)) {
            (Some(actual), Some(expected)) => key_string(actual).as_deref() == Some(&expected),
            (Some(actual), None) => actual == &self.value,
            (None, _) => false,
        }
    }
}

/// 排序规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: &'static str,
    pub descending: bool,
}

impl Order {
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    /// 稳定排序；缺少排序字段的行排在最后
    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| {
            let ordering = compare_values(a.get(self.field), b.get(self.field));
            match (a.get(self.field), b.get(self.field)) {
                (Some(_), Some(_)) if self.descending => ordering.reverse(),
                _ => ordering,
            }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => key_string(x).cmp(&key_string(y)),
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// 整个集合被替换（导入/重置）
    Reload,
}

impl ChangeKind {
    /// 解析实时通道中的 `type` 字段
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// 集合变更通知
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub kind: ChangeKind,
    pub row: Row,
    pub old_row: Option<Row>,
}

impl ChangeEvent {
    pub fn new(collection: &str, kind: ChangeKind, row: Row) -> Self {
        Self {
            collection: collection.to_string(),
            kind,
            row,
            old_row: None,
        }
    }

    pub fn reload(collection: &str) -> Self {
        Self::new(collection, ChangeKind::Reload, Row::new())
    }

    /// 新旧记录任一命中过滤条件即视为相关
    pub fn matches(&self, filter: Option<&Filter>) -> bool {
        match filter {
            None => true,
            Some(_) if self.kind == ChangeKind::Reload => true,
            Some(filter) => {
                filter.matches(&self.row)
                    || self.old_row.as_ref().is_some_and(|old| filter.matches(old))
            }
        }
    }
}

pub type SubscriptionId = u64;

/// 变更订阅：无限的变更事件序列，通过 `unsubscribe` 取消
pub struct Subscription {
    id: SubscriptionId,
    collection: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        collection: &str,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        Self {
            id,
            collection: collection.to_string(),
            events,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 等待下一个事件；订阅被取消后返回 None
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// 非阻塞地取出一个已到达的事件
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

/// 存储层错误，作为 anyhow 错误链的根因
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("网络错误: {0}")]
    Network(String),
    #[error("认证失败: {0}")]
    Auth(String),
    #[error("权限不足: {0}")]
    Permission(String),
    #[error("记录不存在: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("唯一约束冲突: {0}")]
    Conflict(String),
    #[error("数据校验失败: {0}")]
    Validation(String),
    #[error("服务器错误 {status}: {message}")]
    Server { status: u16, message: String },
    #[error("解析数据失败: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Network(_) => ErrorKind::Network,
            StoreError::Auth(_) => ErrorKind::Auth,
            StoreError::Permission(_) => ErrorKind::Permission,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict(_) | StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Server { .. } => ErrorKind::Server,
            StoreError::Decode(_) => ErrorKind::Validation,
        }
    }

    pub fn to_app_error(&self) -> AppError {
        let app_error = AppError::new(self.kind(), self.to_string());
        match self {
            StoreError::Conflict(_) => app_error.with_code("23505"),
            StoreError::Server { status, .. } => app_error.with_code(status.to_string()),
            _ => app_error,
        }
    }
}

/// 错误链中是否包含唯一约束冲突
pub fn is_conflict(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StoreError>(),
            Some(StoreError::Conflict(_))
        )
    })
}
