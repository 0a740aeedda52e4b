//! Client complaint models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const COMPLAINT_STATUSES: [&str; 2] = ["OPEN", "RESOLVED"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Complaint {
    pub id: String,
    pub site_id: String,
    /// Filing client (weak reference to users), taken from the caller's token
    pub client_id: Option<String>,
    pub complaint_text: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateComplaintRequest {
    pub site_id: String,
    pub complaint_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateComplaintRequest {
    pub status: Option<String>,
    pub complaint_text: Option<String>,
}
