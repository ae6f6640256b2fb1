//! 点赞（球员或帖子）
//!
//! 球员与帖子的 id 会重叠，`subject_id` 因此带上类型前缀，例如 `player:1`、`post:1`。

use super::{require_text, Entity, NoPatch, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::collections;
use serde::{Deserialize, Serialize};

/// 点赞对象的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeSubject {
    Player,
    Post,
}

impl LikeSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeSubject::Player => "player",
            LikeSubject::Post => "post",
        }
    }

    /// 带前缀的对象键
    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }

    /// 拆分对象键，返回类型与原始 id
    pub fn parse_key(key: &str) -> Option<(LikeSubject, &str)> {
        let (prefix, id) = key.split_once(':')?;
        let subject = match prefix {
            "player" => LikeSubject::Player,
            "post" => LikeSubject::Post,
            _ => return None,
        };
        Some((subject, id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<LikeSubject>,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeDraft {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<LikeSubject>,
    pub user_id: String,
}

impl Validate for LikeDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.subject_id, "Élément à aimer manquant")?;
        require_text(&self.user_id, "Vous devez être connecté pour aimer")
    }
}

impl Entity for Like {
    const COLLECTION: &'static str = collections::LIKES;
    const SCOPE_FIELD: Option<&'static str> = Some("subject_id");
    type Draft = LikeDraft;
    type Patch = NoPatch;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_keys_round_trip() {
        let key = LikeSubject::Post.key("12");
        assert_eq!(key, "post:12");
        assert_eq!(LikeSubject::parse_key(&key), Some((LikeSubject::Post, "12")));
        assert_eq!(LikeSubject::parse_key("12"), None);
        assert_eq!(LikeSubject::parse_key("group:3"), None);
    }
}
