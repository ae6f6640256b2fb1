//! 社区帖子与投票

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::{collections, Order};
use serde::{Deserialize, Serialize};

/// 作者信息（冗余保存在帖子和评论里）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub avatar: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// 用选项文本创建，票数从 0 开始
    pub fn new(question: impl Into<String>, options: &[&str]) -> Self {
        Self {
            question: question.into(),
            options: options
                .iter()
                .map(|text| PollOption {
                    text: text.to_string(),
                    votes: 0,
                })
                .collect(),
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

impl Validate for Poll {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.question, "La question du sondage est obligatoire")?;
        if self.options.len() < 2 {
            return Err(AppError::validation(
                "Un sondage doit proposer au moins 2 options",
            ));
        }
        for option in &self.options {
            require_text(&option.text, "Les options du sondage ne peuvent pas être vides")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub comments_count: u32,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostDraft {
    pub user_id: String,
    pub author: Author,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
    pub likes_count: u32,
    pub comments_count: u32,
}

impl Validate for PostDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.user_id, "Vous devez être connecté pour publier")?;
        let has_media = self.image.is_some() || self.video.is_some() || self.poll.is_some();
        if self.content.trim().is_empty() && !has_media {
            return Err(AppError::validation("Le contenu du post est vide"));
        }
        if let Some(poll) = &self.poll {
            poll.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostPatch {
    pub content: Option<String>,
    pub image: Option<String>,
    pub video: Option<String>,
    pub poll: Option<Poll>,
    pub likes_count: Option<u32>,
    pub comments_count: Option<u32>,
}

impl Entity for Post {
    const COLLECTION: &'static str = collections::POSTS;
    const ORDER: Option<Order> = Some(Order::desc("created_at"));
    const PREPEND: bool = true;
    type Draft = PostDraft;
    type Patch = PostPatch;

    fn id(&self) -> &str {
        &self.id
    }
}
