//! Salary disbursement models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DISBURSEMENT_STATUSES: [&str; 2] = ["PAID", "PENDING"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalaryDisbursement {
    pub id: String,
    pub site_id: String,
    /// First-of-month date (YYYY-MM-01)
    pub month: String,
    pub status: String,
    pub date_paid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDisbursementRequest {
    pub site_id: String,
    /// Accepts YYYY-MM or a full date; normalized to the first of month
    pub month: String,
    pub status: String,
    pub date_paid: Option<String>,
}
