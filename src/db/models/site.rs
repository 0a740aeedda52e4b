//! Site (client premises under contract) models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    /// Contracted guard strength
    pub strength: i64,
    pub rate_per_guard: f64,
    pub agreement_start: Option<String>,
    pub agreement_end: Option<String>,
    pub area_officer_name: Option<String>,
    pub area_officer_phone: Option<String>,
    pub cro_name: Option<String>,
    pub cro_phone: Option<String>,
    /// Owning client account (weak reference to users)
    pub client_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSiteRequest {
    pub name: String,
    pub location: Option<String>,
    pub strength: Option<i64>,
    pub rate_per_guard: Option<f64>,
    pub agreement_start: Option<String>,
    pub agreement_end: Option<String>,
    pub area_officer_name: Option<String>,
    pub area_officer_phone: Option<String>,
    pub cro_name: Option<String>,
    pub cro_phone: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSiteRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub strength: Option<i64>,
    pub rate_per_guard: Option<f64>,
    pub agreement_start: Option<String>,
    pub agreement_end: Option<String>,
    pub area_officer_name: Option<String>,
    pub area_officer_phone: Option<String>,
    pub cro_name: Option<String>,
    pub cro_phone: Option<String>,
    pub client_id: Option<String>,
}

/// Bulk upsert item: rows with a known id are updated in place, the rest are
/// inserted fresh.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteUpsert {
    pub id: Option<String>,
    pub name: String,
    pub location: Option<String>,
    pub strength: Option<i64>,
    pub rate_per_guard: Option<f64>,
    pub agreement_start: Option<String>,
    pub agreement_end: Option<String>,
    pub area_officer_name: Option<String>,
    pub area_officer_phone: Option<String>,
    pub cro_name: Option<String>,
    pub cro_phone: Option<String>,
    pub client_id: Option<String>,
}
