//! 用户资料（与用户一一对应，以 user_id 为键）

use super::{require_text, Entity, Validate};
use crate::pulse::error::AppError;
use crate::pulse::serialization::deserialize_id;
use crate::pulse::store::collections;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileDraft {
    pub user_id: String,
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
}

impl Validate for ProfileDraft {
    fn validate(&self) -> Result<(), AppError> {
        require_text(&self.user_id, "Utilisateur manquant")?;
        require_text(&self.username, "Le nom d'utilisateur est obligatoire")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl Entity for Profile {
    const COLLECTION: &'static str = collections::PROFILES;
    const SCOPE_FIELD: Option<&'static str> = Some("user_id");
    type Draft = ProfileDraft;
    type Patch = ProfilePatch;

    fn id(&self) -> &str {
        &self.user_id
    }
}
