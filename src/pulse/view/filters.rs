//! 按位置筛选球员

use crate::pulse::models::{Player, Position};
use crate::pulse::view::PlayerView;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// 位置筛选条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PositionFilter {
    #[default]
    All,
    Only(Position),
}

impl PositionFilter {
    pub fn matches(&self, position: Position) -> bool {
        match self {
            PositionFilter::All => true,
            PositionFilter::Only(wanted) => *wanted == position,
        }
    }

    pub fn apply<T: Positioned + Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .filter(|item| self.matches(item.position()))
            .cloned()
            .collect()
    }
}

/// 无法识别的值按“全部”处理
impl FromStr for PositionFilter {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let filter = match value.trim().to_lowercase().as_str() {
            "attaquant" => PositionFilter::Only(Position::Attaquant),
            "milieu" => PositionFilter::Only(Position::Milieu),
            "defenseur" | "défenseur" => PositionFilter::Only(Position::Defenseur),
            _ => PositionFilter::All,
        };
        Ok(filter)
    }
}

impl fmt::Display for PositionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionFilter::All => f.write_str("all"),
            PositionFilter::Only(position) => f.write_str(position.label()),
        }
    }
}

/// 带位置信息的记录
pub trait Positioned {
    fn position(&self) -> Position;
}

impl Positioned for Player {
    fn position(&self) -> Position {
        self.position
    }
}

impl Positioned for PlayerView {
    fn position(&self) -> Position {
        self.player.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, position: Position) -> Player {
        Player {
            id: id.into(),
            name: format!("Joueur {}", id),
            position,
            club: String::new(),
            photo: String::new(),
            stats: None,
            created_at: None,
        }
    }

    #[test]
    fn parses_filter_names() {
        assert_eq!("milieu".parse::<PositionFilter>(), Ok(PositionFilter::Only(Position::Milieu)));
        assert_eq!("Attaquant".parse::<PositionFilter>(), Ok(PositionFilter::Only(Position::Attaquant)));
        assert_eq!("defenseur".parse::<PositionFilter>(), Ok(PositionFilter::Only(Position::Defenseur)));
        assert_eq!("all".parse::<PositionFilter>(), Ok(PositionFilter::All));
        assert_eq!("gardien".parse::<PositionFilter>(), Ok(PositionFilter::All));
    }

    #[test]
    fn one_milieu_among_four() {
        let players = vec![
            player("1", Position::Attaquant),
            player("2", Position::Attaquant),
            player("3", Position::Milieu),
            player("4", Position::Defenseur),
        ];
        let filter: PositionFilter = "milieu".parse().unwrap();
        let milieux = filter.apply(&players);
        assert_eq!(milieux.len(), 1);
        assert_eq!(milieux[0].id, "3");
        assert_eq!(PositionFilter::All.apply(&players).len(), 4);
    }
}
