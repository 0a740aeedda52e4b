//! Operational spend models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Spend {
    pub id: String,
    pub site_id: String,
    pub date: String,
    pub amount: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSpendRequest {
    pub site_id: String,
    pub date: String,
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSpendRequest {
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
}
