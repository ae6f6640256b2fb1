use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Notification, NotificationDraft, NotificationPatch};
use tracing::info;

impl CollectionBinding<Notification> {
    /// 给绑定的用户推送一条通知
    pub async fn push(
        &self,
        kind: &str,
        title: &str,
        description: &str,
        link: Option<&str>,
    ) -> Result<Notification, AppError> {
        let user_id = self.expect_scope_key("push");
        let mut draft = NotificationDraft::new(user_id, kind, title, description);
        if let Some(link) = link {
            draft = draft.with_link(link);
        }
        self.create(draft).await
    }

    pub async fn mark_as_read(&self, notification_id: &str) -> Result<Notification, AppError> {
        self.update(notification_id, NotificationPatch::mark_read())
            .await
    }

    /// 把所有未读通知标为已读，返回处理的数量
    pub async fn mark_all_as_read(&self) -> Result<usize, AppError> {
        let unread: Vec<String> = self
            .snapshot()
            .into_iter()
            .filter(|n| !n.read)
            .map(|n| n.id)
            .collect();
        for id in &unread {
            self.mark_as_read(id).await?;
        }
        info!(
            "[Binding/{}] 📬 {} 条通知已读",
            self.core.label,
            unread.len()
        );
        Ok(unread.len())
    }

    pub async fn delete(&self, notification_id: &str) -> Result<(), AppError> {
        self.remove(notification_id).await
    }

    pub fn unread_count(&self) -> usize {
        self.snapshot().iter().filter(|n| !n.read).count()
    }
}
