//! Monthly satisfaction rating models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub id: String,
    pub site_id: String,
    pub client_id: Option<String>,
    /// First-of-month date (YYYY-MM-01)
    pub month: String,
    /// 1-5 satisfaction score
    pub rating_value: i64,
    pub nps_score: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRatingRequest {
    pub site_id: String,
    pub month: String,
    pub rating_value: i64,
    pub nps_score: Option<i64>,
}

/// Admin/CRO variant: files the rating on behalf of a named client.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRatingAdminRequest {
    pub site_id: String,
    pub client_id: Option<String>,
    pub month: String,
    pub rating_value: i64,
    pub nps_score: Option<i64>,
}
