use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Post, PostDraft, PostPatch};

impl CollectionBinding<Post> {
    pub async fn create_post(&self, draft: PostDraft) -> Result<Post, AppError> {
        self.create(draft).await
    }

    pub async fn update_post(&self, post_id: &str, patch: PostPatch) -> Result<Post, AppError> {
        self.update(post_id, patch).await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        self.remove(post_id).await
    }

    /// 点赞数加一
    pub async fn like_post(&self, post_id: &str) -> Result<Post, AppError> {
        let post = self.require_item("like_post", post_id).await?;
        self.update(
            post_id,
            PostPatch {
                likes_count: Some(post.likes_count.saturating_add(1)),
                ..Default::default()
            },
        )
        .await
    }

    /// 点赞数减一，不会小于 0
    pub async fn unlike_post(&self, post_id: &str) -> Result<Post, AppError> {
        let post = self.require_item("unlike_post", post_id).await?;
        self.update(
            post_id,
            PostPatch {
                likes_count: Some(post.likes_count.saturating_sub(1)),
                ..Default::default()
            },
        )
        .await
    }

    /// 为帖子投票中的一个选项加一票
    pub async fn vote_poll(&self, post_id: &str, option_index: usize) -> Result<Post, AppError> {
        let post = self.require_item("vote_poll", post_id).await?;
        let Some(mut poll) = post.poll else {
            return self
                .fail("vote_poll", AppError::validation("Ce post ne contient pas de sondage"))
                .await;
        };
        let Some(option) = poll.options.get_mut(option_index) else {
            return self
                .fail("vote_poll", AppError::validation("Option de sondage invalide"))
                .await;
        };
        option.votes = option.votes.saturating_add(1);

        self.update(
            post_id,
            PostPatch {
                poll: Some(poll),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::error::ErrorKind;
    use crate::pulse::models::{Author, Poll};
    use crate::pulse::store::MemoryStore;
    use crate::pulse::test_support::init_test_logger;
    use std::sync::Arc;

    async fn seeded_posts() -> CollectionBinding<Post> {
        init_test_logger();
        let posts = CollectionBinding::<Post>::open(Arc::new(MemoryStore::seeded()), None);
        posts.loaded().await;
        posts
    }

    #[tokio::test]
    async fn poll_posts_are_validated_and_prepended() {
        let posts = seeded_posts().await;
        let draft = PostDraft {
            user_id: "user-123".into(),
            author: Author {
                name: "Utilisateur Test".into(),
                ..Default::default()
            },
            content: "Meilleur milieu ?".into(),
            poll: Some(Poll::new("Qui ?", &["Bellingham"])),
            ..Default::default()
        };
        let err = posts.create_post(draft.clone()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(posts.snapshot().len(), 2);

        let created = posts
            .create_post(PostDraft {
                poll: Some(Poll::new("Qui ?", &["Bellingham", "Pedri"])),
                ..draft
            })
            .await
            .unwrap();
        assert_eq!(posts.snapshot()[0].id, created.id);
        assert_eq!(created.poll.map(|p| p.options.len()), Some(2));
    }

    #[tokio::test]
    async fn likes_count_never_goes_negative() {
        let posts = seeded_posts().await;
        let created = posts
            .create_post(PostDraft {
                user_id: "user-123".into(),
                content: "Allez les Bleus".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let unliked = posts.unlike_post(&created.id).await.unwrap();
        assert_eq!(unliked.likes_count, 0);
        let liked = posts.like_post("1").await.unwrap();
        assert_eq!(liked.likes_count, 46);
        assert_eq!(posts.find("1").map(|p| p.likes_count), Some(46));
    }

    #[tokio::test]
    async fn poll_votes_increment_one_option() {
        let posts = seeded_posts().await;
        let voted = posts.vote_poll("2", 1).await.unwrap();
        let votes: Vec<u32> = voted
            .poll
            .map(|p| p.options.iter().map(|o| o.votes).collect())
            .unwrap_or_default();
        assert_eq!(votes, vec![45, 39, 32, 15]);

        assert_eq!(
            posts.vote_poll("2", 9).await.unwrap_err().kind,
            ErrorKind::Validation
        );
        assert_eq!(
            posts.vote_poll("1", 0).await.unwrap_err().kind,
            ErrorKind::Validation
        );
        assert_eq!(
            posts.vote_poll("404", 0).await.unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn update_and_delete_posts() {
        let posts = seeded_posts().await;
        let updated = posts
            .update_post(
                "1",
                PostPatch {
                    content: Some("Édité".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.content, "Édité");
        assert_eq!(updated.likes_count, 45);

        posts.delete_post("1").await.unwrap();
        assert!(posts.find("1").is_none());
    }
}
