//! 用户通知

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::{collections, Order};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    /// like / comment / vote / follow / system ...
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "message")]
    pub description: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationDraft {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub read: bool,
}

impl NotificationDraft {
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind: kind.into(),
            title: title.into(),
            description: description.into(),
            link: None,
            read: false,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

impl Validate for NotificationDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.user_id, "Destinataire manquant")?;
        require_text(&self.title, "Le titre de la notification est vide")
    }
}

/// 通知只能从未读变为已读
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPatch {
    read: bool,
}

impl NotificationPatch {
    pub fn mark_read() -> Self {
        Self { read: true }
    }
}

impl Entity for Notification {
    const COLLECTION: &'static str = collections::NOTIFICATIONS;
    const SCOPE_FIELD: Option<&'static str> = Some("user_id");
    const ORDER: Option<Order> = Some(Order::desc("created_at"));
    const PREPEND: bool = true;
    type Draft = NotificationDraft;
    type Patch = NotificationPatch;

    fn id(&self) -> &str {
        &self.id
    }
}
