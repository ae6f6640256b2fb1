use super::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Vote, VoteDraft};
use crate::pulse::view::vote_total;

impl CollectionBinding<Vote> {
    /// 为绑定的球员投一票（不检查同一用户是否已投过）
    pub async fn vote(&self, user_id: &str, value: i64) -> Result<Vote, AppError> {
        let player_id = self.expect_scope_key("vote");
        self.create(VoteDraft {
            player_id,
            user_id: user_id.to_string(),
            value,
        })
        .await
    }

    /// 当前快照的得票总和
    pub fn total(&self) -> i64 {
        vote_total(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::store::{MemoryStore, Row, Store};
    use crate::pulse::test_support::init_test_logger;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn votes_for_one_player_are_summed() {
        init_test_logger();
        let store = Arc::new(MemoryStore::new());
        for (user, player) in [("u1", "42"), ("u2", "42"), ("u3", "7")] {
            let mut row = Row::new();
            row.insert("player_id".into(), json!(player));
            row.insert("user_id".into(), json!(user));
            row.insert("value".into(), json!(1));
            store.insert("votes", row).await.unwrap();
        }

        let votes = CollectionBinding::<Vote>::open(store.clone(), Some("42"));
        votes.loaded().await;
        assert_eq!(votes.snapshot().len(), 2);
        assert_eq!(votes.total(), 2);

        votes.vote("u4", 3).await.unwrap();
        assert_eq!(votes.total(), 5);
    }

    #[tokio::test]
    async fn same_user_may_vote_twice() {
        init_test_logger();
        let store = Arc::new(MemoryStore::new());
        let votes = CollectionBinding::<Vote>::open(store, Some("1"));
        votes.loaded().await;

        votes.vote("user-123", 1).await.unwrap();
        votes.vote("user-123", 1).await.unwrap();
        assert_eq!(votes.total(), 2);
    }
}
