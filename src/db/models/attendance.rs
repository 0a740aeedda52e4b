//! Daily attendance models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ATTENDANCE_STATUSES: [&str; 3] = ["PRESENT", "ABSENT", "LEAVE"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: String,
    pub site_id: String,
    /// Weak reference, resolved against guards first and users as a fallback
    pub guard_id: Option<String>,
    pub date: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAttendanceRequest {
    pub site_id: String,
    pub guard_id: Option<String>,
    pub date: String,
    /// Defaults to PRESENT when omitted
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAttendanceRequest {
    pub guard_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
}
