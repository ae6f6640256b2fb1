//! 粉丝群组

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::{collections, Order};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDraft {
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub members: Vec<String>,
}

impl Validate for GroupDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.owner_id, "Vous devez être connecté pour créer un groupe")?;
        require_text(&self.name, "Le nom du groupe est obligatoire")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub members: Option<Vec<String>>,
}

impl Entity for Group {
    const COLLECTION: &'static str = collections::GROUPS;
    const ORDER: Option<Order> = Some(Order::desc("created_at"));
    const PREPEND: bool = true;
    type Draft = GroupDraft;
    type Patch = GroupPatch;

    fn id(&self) -> &str {
        &self.id
    }
}
