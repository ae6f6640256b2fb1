use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Message, MessageDraft, MessageKind, MessagePatch, MessageStatus};

impl CollectionBinding<Message> {
    /// 在绑定的会话中发送消息，状态为已发送
    pub async fn send_message(
        &self,
        sender_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message, AppError> {
        let conversation_id = self.expect_scope_key("send_message");
        self.create(MessageDraft {
            conversation_id,
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            kind,
            status: MessageStatus::Sent,
        })
        .await
    }

    pub async fn mark_read(&self, message_id: &str) -> Result<Message, AppError> {
        self.update(
            message_id,
            MessagePatch {
                status: Some(MessageStatus::Read),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::store::MemoryStore;
    use crate::pulse::test_support::init_test_logger;
    use std::sync::Arc;

    #[tokio::test]
    async fn messages_are_appended_in_send_order() {
        init_test_logger();
        let store = Arc::new(MemoryStore::new());
        let chat = CollectionBinding::<Message>::open(store.clone(), Some("c1"));
        let other = CollectionBinding::<Message>::open(store, Some("c2"));
        chat.loaded().await;
        other.loaded().await;

        let first = chat
            .send_message("user-123", "Salut", MessageKind::Text)
            .await
            .unwrap();
        chat.send_message("user-456", "Ça va ?", MessageKind::Text)
            .await
            .unwrap();
        assert_eq!(first.status, MessageStatus::Sent);

        let contents: Vec<_> = chat.snapshot().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["Salut", "Ça va ?"]);
        assert!(other.snapshot().is_empty());

        let read = chat.mark_read(&first.id).await.unwrap();
        assert_eq!(read.status, MessageStatus::Read);
    }
}
