//! 帖子评论（可回复）

use super::{require_text, Author, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::{deserialize_id, deserialize_opt_id};
use crate::pulse::store::{collections, Order};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub post_id: String,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(default)]
    pub author: Author,
    pub content: String,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentDraft {
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub user_id: String,
    pub author: Author,
    pub content: String,
}

impl Validate for CommentDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.user_id, "Vous devez être connecté pour commenter")?;
        require_text(&self.content, "Le commentaire est vide")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentPatch {
    pub content: Option<String>,
}

impl Entity for Comment {
    const COLLECTION: &'static str = collections::COMMENTS;
    const SCOPE_FIELD: Option<&'static str> = Some("post_id");
    const ORDER: Option<Order> = Some(Order::asc("created_at"));
    type Draft = CommentDraft;
    type Patch = CommentPatch;

    fn id(&self) -> &str {
        &self.id
    }
}
