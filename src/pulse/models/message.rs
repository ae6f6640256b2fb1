//! 聊天消息

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::{collections, Order};
use serde::{Deserialize, Serialize};

/// 消息内容类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    File,
}

/// 投递状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub conversation_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub status: MessageStatus,
}

impl Validate for MessageDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.sender_id, "Expéditeur manquant")?;
        require_text(&self.content, "Le message est vide")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub status: Option<MessageStatus>,
}

impl Entity for Message {
    const COLLECTION: &'static str = collections::MESSAGES;
    const SCOPE_FIELD: Option<&'static str> = Some("conversation_id");
    const ORDER: Option<Order> = Some(Order::asc("created_at"));
    type Draft = MessageDraft;
    type Patch = MessagePatch;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_and_status_default() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "content": "Salut"
        }))
        .unwrap();
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.status, MessageStatus::Sent);

        let image: Message = serde_json::from_value(json!({
            "id": "m2",
            "conversation_id": "c1",
            "sender_id": "u1",
            "content": "https://cdn.example/a.png",
            "type": "image",
            "status": "read"
        }))
        .unwrap();
        assert_eq!(image.kind, MessageKind::Image);
        assert_eq!(image.status, MessageStatus::Read);
    }
}
