//! 球员投票

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::collections;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub player_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    /// 权重；缺失按 0 计
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteDraft {
    pub player_id: String,
    pub user_id: String,
    pub value: i64,
}

impl Validate for VoteDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.player_id, "Joueur manquant")?;
        require_text(&self.user_id, "Vous devez être connecté pour voter")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VotePatch {
    pub value: Option<i64>,
}

impl Entity for Vote {
    const COLLECTION: &'static str = collections::VOTES;
    const SCOPE_FIELD: Option<&'static str> = Some("player_id");
    type Draft = VoteDraft;
    type Patch = VotePatch;

    fn id(&self) -> &str {
        &self.id
    }
}
