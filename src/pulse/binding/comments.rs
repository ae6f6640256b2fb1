use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Author, Comment, CommentDraft};
use crate::pulse::view::CommentTree;

impl CollectionBinding<Comment> {
    /// 在绑定的帖子下发表评论
    pub async fn add_comment(
        &self,
        user_id: &str,
        author: Author,
        content: &str,
    ) -> Result<Comment, AppError> {
        let post_id = self.expect_scope_key("add_comment");
        self.create(CommentDraft {
            post_id,
            parent_id: None,
            user_id: user_id.to_string(),
            author,
            content: content.to_string(),
        })
        .await
    }

    /// 回复一条已有评论
    pub async fn reply(
        &self,
        parent_id: &str,
        user_id: &str,
        author: Author,
        content: &str,
    ) -> Result<Comment, AppError> {
        let post_id = self.expect_scope_key("reply");
        self.require_item("reply", parent_id).await?;
        self.create(CommentDraft {
            post_id,
            parent_id: Some(parent_id.to_string()),
            user_id: user_id.to_string(),
            author,
            content: content.to_string(),
        })
        .await
    }

    /// 当前快照组成的评论树
    pub fn thread(&self) -> CommentTree {
        CommentTree::from_comments(self.snapshot())
    }
}
