//! Client billing models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const BILL_STATUSES: [&str; 2] = ["OUTSTANDING", "PAID"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bill {
    pub id: String,
    /// Unique human-readable code, derived from the id when not supplied
    pub code: String,
    pub site_id: String,
    pub amount: f64,
    pub due_date: String,
    pub status: String,
    pub invoice_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Derive the display code from a freshly generated UUID: `BILL-` plus the
/// first eight hex chars, uppercased. Collisions surface as a unique
/// constraint failure on insert.
pub fn bill_code_from_id(id: &str) -> String {
    let hex: String = id
        .chars()
        .filter(|c| *c != '-')
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("BILL-{}", hex)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBillRequest {
    pub code: Option<String>,
    pub site_id: String,
    pub amount: f64,
    pub due_date: String,
    pub status: Option<String>,
    pub invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBillRequest {
    pub amount: Option<f64>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub invoice_url: Option<String>,
}

/// Statement-of-account payload: rows in range plus the outstanding total.
#[derive(Debug, Serialize)]
pub struct SoaResponse {
    pub items: Vec<serde_json::Value>,
    pub outstanding: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_code_format() {
        let id = uuid::Uuid::new_v4().to_string();
        let code = bill_code_from_id(&id);
        let re = regex::Regex::new(r"^BILL-[A-F0-9]{8}$").unwrap();
        assert!(re.is_match(&code), "unexpected code: {}", code);
    }

    #[test]
    fn test_bill_code_skips_dashes() {
        assert_eq!(
            bill_code_from_id("550e8400-e29b-41d4-a716-446655440000"),
            "BILL-550E8400"
        );
        assert_eq!(
            bill_code_from_id("ab-cd-ef-01-23-45-67-89aa"),
            "BILL-ABCDEF01"
        );
    }
}
