//! 候选球员

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::collections;
use serde::{Deserialize, Serialize};

/// 场上位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Attaquant,
    Milieu,
    #[serde(rename = "Défenseur", alias = "Defenseur")]
    Defenseur,
}

impl Position {
    pub fn label(&self) -> &'static str {
        match self {
            Position::Attaquant => "Attaquant",
            Position::Milieu => "Milieu",
            Position::Defenseur => "Défenseur",
        }
    }
}

/// 赛季数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub goals: u32,
    pub assists: u32,
    pub matches: u32,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub club: String,
    #[serde(default)]
    pub photo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlayerStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDraft {
    pub name: String,
    pub position: Position,
    pub club: String,
    pub photo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PlayerStats>,
}

impl Validate for PlayerDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.name, "Le nom du joueur est obligatoire")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub position: Option<Position>,
    pub club: Option<String>,
    pub photo: Option<String>,
    pub stats: Option<PlayerStats>,
}

impl Entity for Player {
    const COLLECTION: &'static str = collections::PLAYERS;
    type Draft = PlayerDraft;
    type Patch = PlayerPatch;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn position_accepts_accented_and_plain_spelling() {
        let accented: Position = serde_json::from_value(json!("Défenseur")).unwrap();
        let plain: Position = serde_json::from_value(json!("Defenseur")).unwrap();
        assert_eq!(accented, Position::Defenseur);
        assert_eq!(plain, Position::Defenseur);
        assert_eq!(serde_json::to_value(Position::Defenseur).unwrap(), json!("Défenseur"));
    }

    #[test]
    fn numeric_ids_and_missing_stats_decode() {
        let player: Player = serde_json::from_value(json!({
            "id": 7,
            "name": "Vinicius Jr",
            "position": "Attaquant"
        }))
        .unwrap();
        assert_eq!(player.id, "7");
        assert!(player.stats.is_none());
        assert!(player.club.is_empty());
    }
}
