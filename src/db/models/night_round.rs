//! Night patrol round models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NightRound {
    pub id: String,
    pub site_id: String,
    pub date: String,
    /// Weak reference to the patrolling officer's user account
    pub officer_id: Option<String>,
    pub findings: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNightRoundRequest {
    pub site_id: String,
    pub date: String,
    pub officer_id: Option<String>,
    pub findings: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNightRoundRequest {
    pub date: Option<String>,
    pub officer_id: Option<String>,
    pub findings: Option<String>,
}
