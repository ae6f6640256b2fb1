//! 排行榜：全部球员 + 全部投票 + 全部点赞

use crate::pulse::binding::CollectionBinding;
use crate::pulse::error::AppError;
use crate::pulse::models::{Like, LikeSubject, Player, Vote};
use crate::pulse::view::{PlayerView, PositionFilter};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 排名（从 1 开始）
#[derive(Debug, Clone, Serialize)]
pub struct RankedPlayer {
    pub rank: usize,
    #[serde(flatten)]
    pub view: PlayerView,
}

/// 按得票降序排列，票数相同按名字排序
pub fn rank(mut views: Vec<PlayerView>) -> Vec<RankedPlayer> {
    views.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.player.name.cmp(&b.player.name))
    });
    views
        .into_iter()
        .enumerate()
        .map(|(index, view)| RankedPlayer {
            rank: index + 1,
            view,
        })
        .collect()
}

/// 所有球员的组合视图
pub fn compose_all(
    players: Vec<Player>,
    votes: &[Vote],
    likes: &[Like],
    user_id: Option<&str>,
) -> Vec<PlayerView> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for vote in votes {
        *totals.entry(vote.player_id.as_str()).or_default() += vote.value.unwrap_or(0);
    }
    let liked: HashSet<&str> = match user_id {
        Some(user) => likes
            .iter()
            .filter(|like| like.user_id == user)
            .filter_map(|like| match LikeSubject::parse_key(&like.subject_id) {
                Some((LikeSubject::Player, id)) => Some(id),
                _ => None,
            })
            .collect(),
        None => HashSet::new(),
    };

    players
        .into_iter()
        .map(|player| PlayerView {
            votes: totals.get(player.id.as_str()).copied().unwrap_or(0),
            is_liked: liked.contains(player.id.as_str()),
            player,
        })
        .collect()
}

/// 球员列表页与排行榜使用的看板
pub struct PlayerBoard {
    user_id: Option<String>,
    players: Arc<CollectionBinding<Player>>,
    votes: CollectionBinding<Vote>,
    likes: CollectionBinding<Like>,
}

impl PlayerBoard {
    /// `votes` 与 `likes` 应该是不带作用域的绑定
    pub fn new(
        players: Arc<CollectionBinding<Player>>,
        votes: CollectionBinding<Vote>,
        likes: CollectionBinding<Like>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            players,
            votes,
            likes,
        }
    }

    pub async fn loaded(&self) {
        self.players.loaded().await;
        self.votes.loaded().await;
        self.likes.loaded().await;
    }

    pub fn error(&self) -> Option<AppError> {
        self.players
            .error()
            .or_else(|| self.votes.error())
            .or_else(|| self.likes.error())
    }

    /// 球员列表（存储顺序）
    pub fn views(&self, filter: PositionFilter) -> Vec<PlayerView> {
        let views = compose_all(
            self.players.snapshot(),
            &self.votes.snapshot(),
            &self.likes.snapshot(),
            self.user_id.as_deref(),
        );
        filter.apply(&views)
    }

    pub fn ranking(&self, filter: PositionFilter) -> Vec<RankedPlayer> {
        rank(self.views(filter))
    }

    pub fn close(&self) {
        self.votes.close();
        self.likes.close();
    }
}
