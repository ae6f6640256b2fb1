//! 实体模型
//!
//! 每个实体对应一个集合，通过 [`Entity`] 描述集合名称、作用域字段、排序和新建记录的插入位置。

pub mod comment;
pub mod group;
pub mod like;
pub mod message;
pub mod notification;
pub mod player;
pub mod post;
pub mod profile;
pub mod vote;

use crate::pulse::error::AppError;
use crate::pulse::store::Order;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use comment::{Comment, CommentDraft, CommentPatch};
pub use group::{Group, GroupDraft, GroupPatch};
pub use like::{Like, LikeDraft, LikeSubject};
pub use message::{Message, MessageDraft, MessageKind, MessagePatch, MessageStatus};
pub use notification::{Notification, NotificationDraft, NotificationPatch};
pub use player::{Player, PlayerDraft, PlayerPatch, PlayerStats, Position};
pub use post::{Author, Poll, PollOption, Post, PostDraft, PostPatch};
pub use profile::{Profile, ProfileDraft, ProfilePatch};
pub use vote::{Vote, VoteDraft, VotePatch};

/// 提交前的输入校验
pub trait Validate {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// 不支持更新的实体使用的空补丁
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoPatch {}

/// 绑定到某个集合的实体
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// 集合名称
    const COLLECTION: &'static str;
    /// 作用域字段（如 votes 的 `player_id`）；为 None 时绑定整个集合
    const SCOPE_FIELD: Option<&'static str> = None;
    /// 查询排序；为 None 时保持存储顺序
    const ORDER: Option<Order> = None;
    /// 新建的记录是否放在快照最前面
    const PREPEND: bool = false;

    type Draft: Serialize + Validate + Send + Sync;
    type Patch: Serialize + Send + Sync;

    /// 主键
    fn id(&self) -> &str;
}

/// 校验必填的文本字段
pub(crate) fn require_text(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::validation(message))
    } else {
        Ok(())
    }
}
