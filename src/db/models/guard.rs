//! Guard roster models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guard {
    pub id: String,
    pub site_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGuardRequest {
    pub site_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGuardRequest {
    pub site_id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}
