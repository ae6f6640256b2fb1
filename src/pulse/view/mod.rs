//! 派生视图：组合多个绑定的只读模型

pub mod filters;
pub mod player_view;
pub mod ranking;
pub mod thread;

pub use filters::{Positioned, PositionFilter};
pub use player_view::{is_liked_by, vote_total, PlayerCard, PlayerView};
pub use ranking::{compose_all, rank, PlayerBoard, RankedPlayer};
pub use thread::CommentTree;
