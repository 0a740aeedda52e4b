//! Shift coverage models. One row per site, day and shift type.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const SHIFT_TYPES: [&str; 3] = ["DAY", "EVENING", "NIGHT"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shift {
    pub id: String,
    pub site_id: String,
    pub date: String,
    pub shift_type: String,
    pub guard_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateShiftRequest {
    pub site_id: String,
    pub date: String,
    pub shift_type: String,
    pub guard_count: i64,
}

/// Aggregated guard count for one shift type on the latest recorded day.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShiftAggregate {
    pub shift: String,
    pub guards: i64,
}
