use super::CollectionBinding;
use crate::pulse::error::{with_error_handling, AppError};
use crate::pulse::models::{Like, LikeDraft, LikeSubject};
use crate::pulse::store::is_conflict;
use crate::pulse::view::is_liked_by;
use tracing::debug;

impl CollectionBinding<Like> {
    /// 点赞；重复点赞由存储端的唯一约束拒绝，这里把冲突当作成功
    pub async fn like(&self, user_id: &str) -> Result<(), AppError> {
        let subject_id = self.expect_scope_key("like");
        let draft = LikeDraft {
            subject_type: LikeSubject::parse_key(&subject_id).map(|(subject, _)| subject),
            subject_id,
            user_id: user_id.to_string(),
        };

        let inserted = with_error_handling(&self.context("like"), self.toasts(), async {
            match self.insert_row(&draft).await {
                Ok(inserted) => Ok(Some(inserted)),
                Err(err) if is_conflict(&err) => {
                    debug!(
                        "[Binding/{}] 👍 {} 已经点过赞",
                        self.core.label, draft.user_id
                    );
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        })
        .await?;

        match inserted {
            Some((like, row)) => self.absorb_inserted(&like, &row),
            // 存储端已有这一行，本地快照可能还没有
            None if !self.is_liked_by(user_id) => self.refresh().await,
            None => {}
        }
        Ok(())
    }

    /// 取消点赞：删除该用户在这个对象上的所有点赞
    pub async fn unlike(&self, user_id: &str) -> Result<(), AppError> {
        self.expect_scope_key("unlike");
        let mine: Vec<String> = self
            .snapshot()
            .into_iter()
            .filter(|like| like.user_id == user_id)
            .map(|like| like.id)
            .collect();
        for id in mine {
            self.remove(&id).await?;
        }
        Ok(())
    }

    /// 在点赞和取消之间切换，返回切换后的状态
    pub async fn toggle_like(&self, user_id: &str) -> Result<bool, AppError> {
        if self.is_liked_by(user_id) {
            self.unlike(user_id).await?;
            Ok(false)
        } else {
            self.like(user_id).await?;
            Ok(true)
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        is_liked_by(&self.snapshot(), user_id)
    }

    pub fn like_count(&self) -> usize {
        self.snapshot().len()
    }
}
