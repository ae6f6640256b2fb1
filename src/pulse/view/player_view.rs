//! 球员的组合视图：球员 + 得票 + 当前用户是否点赞
//!
//! 每次读取都重新计算，不修改任何数据源。

use crate::pulse::binding::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Like, LikeSubject, Player, Vote};
use crate::pulse::store::Store;
use crate::pulse::toast::ToastListener;
use serde::Serialize;
use std::sync::Arc;

/// 得票总和；缺失的权重按 0 计
pub fn vote_total(votes: &[Vote]) -> i64 {
    votes.iter().map(|vote| vote.value.unwrap_or(0)).sum()
}

/// 是否有该用户的点赞
pub fn is_liked_by(likes: &[Like], user_id: &str) -> bool {
    likes.iter().any(|like| like.user_id == user_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    #[serde(flatten)]
    pub player: Player,
    pub votes: i64,
    pub is_liked: bool,
}

impl PlayerView {
    /// `votes` 与 `likes` 必须已经限定在这个球员上
    pub fn compose(player: Player, votes: &[Vote], likes: &[Like], user_id: Option<&str>) -> Self {
        Self {
            player,
            votes: vote_total(votes),
            is_liked: user_id.is_some_and(|user| is_liked_by(likes, user)),
        }
    }
}

/// 单个球员的卡片：组合球员列表、该球员的投票和点赞三个绑定
pub struct PlayerCard {
    player_id: String,
    user_id: Option<String>,
    players: Arc<CollectionBinding<Player>>,
    votes: CollectionBinding<Vote>,
    likes: CollectionBinding<Like>,
}

impl PlayerCard {
    pub fn open(
        store: Arc<dyn Store>,
        players: Arc<CollectionBinding<Player>>,
        player_id: &str,
        user_id: Option<&str>,
        toasts: Option<Arc<dyn ToastListener>>,
    ) -> Self {
        let like_key = LikeSubject::Player.key(player_id);
        Self {
            player_id: player_id.to_string(),
            user_id: user_id.map(str::to_string),
            votes: CollectionBinding::open_with(store.clone(), Some(player_id), toasts.clone()),
            likes: CollectionBinding::open_with(store, Some(&like_key), toasts),
            players,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub async fn loaded(&self) {
        self.players.loaded().await;
        self.votes.loaded().await;
        self.likes.loaded().await;
    }

    pub fn is_loading(&self) -> bool {
        self.players.is_loading() || self.votes.is_loading() || self.likes.is_loading()
    }

    /// 任一数据源的最近错误
    pub fn error(&self) -> Option<AppError> {
        self.players
            .error()
            .or_else(|| self.votes.error())
            .or_else(|| self.likes.error())
    }

    /// 当前的组合视图；球员不在列表中时为 None
    pub fn view(&self) -> Option<PlayerView> {
        let player = self.players.find(&self.player_id)?;
        Some(PlayerView::compose(
            player,
            &self.votes.snapshot(),
            &self.likes.snapshot(),
            self.user_id.as_deref(),
        ))
    }

    pub fn votes(&self) -> &CollectionBinding<Vote> {
        &self.votes
    }

    pub fn likes(&self) -> &CollectionBinding<Like> {
        &self.likes
    }

    /// 以当前用户身份投票
    pub async fn vote(&self, value: i64) -> Result<Vote, AppError> {
        let user_id = self.user_id.clone().unwrap_or_default();
        self.votes.vote(&user_id, value).await
    }

    /// 以当前用户身份切换点赞
    pub async fn toggle_like(&self) -> Result<bool, AppError> {
        let user_id = self.user_id.clone().unwrap_or_default();
        self.likes.toggle_like(&user_id).await
    }

    pub fn close(&self) {
        self.votes.close();
        self.likes.close();
    }
}
