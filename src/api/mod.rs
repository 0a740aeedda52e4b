pub mod auth;
pub mod tokens;

mod attendance;
mod billing;
mod complaints;
mod error;
mod guards;
mod night_rounds;
mod payroll;
mod query;
mod ratings;
mod reports;
mod shifts;
mod sites;
mod spend;
mod training;
mod users;
mod validation;

pub use error::{ApiError, ErrorCode};

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Plain acknowledgement body for deletes and fire-and-forget operations
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Bulk insert result
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertedResponse {
    pub inserted: usize,
}

/// Bulk upsert result
#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertedResponse {
    pub upserted: usize,
}

/// Bulk request body: either a bare array or `{"items": [...]}` — both forms
/// are in active use by the clients.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BulkBody<T> {
    Wrapped { items: Vec<T> },
    List(Vec<T>),
}

impl<T> BulkBody<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            BulkBody::Wrapped { items } => items,
            BulkBody::List(items) => items,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/refresh", post(auth::refresh));

    // Protected resource routes; identity is resolved per handler by the
    // AuthUser extractor and roles checked against each route's allowlist
    let api_routes = Router::new()
        // Users (admin)
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        // Sites
        .route("/sites", get(sites::list_sites))
        .route("/sites", post(sites::create_site))
        .route("/sites/bulk", post(sites::bulk_upsert_sites))
        .route("/sites/:id", get(sites::get_site))
        .route("/sites/:id", put(sites::update_site))
        .route("/sites/:id", delete(sites::delete_site))
        // Guards
        .route("/guards", get(guards::list_guards))
        .route("/guards", post(guards::create_guard))
        .route("/guards/bulk", post(guards::bulk_create_guards))
        .route("/guards/:id", get(guards::get_guard))
        .route("/guards/:id", put(guards::update_guard))
        .route("/guards/:id", delete(guards::delete_guard))
        // Shifts
        .route("/shifts", get(shifts::latest_day_breakdown))
        .route("/shifts", post(shifts::create_shift))
        .route("/shifts/latest", get(shifts::latest_day_total))
        .route("/shifts/list/all", get(shifts::list_shifts))
        .route("/shifts/bulk", post(shifts::bulk_create_shifts))
        .route("/shifts/:id", put(shifts::update_shift))
        .route("/shifts/:id", delete(shifts::delete_shift))
        // Attendance
        .route("/attendance", get(attendance::list_attendance))
        .route("/attendance", post(attendance::create_attendance))
        .route("/attendance/bulk", post(attendance::bulk_create_attendance))
        .route("/attendance/:id", get(attendance::get_attendance))
        .route("/attendance/:id", put(attendance::update_attendance))
        .route("/attendance/:id", delete(attendance::delete_attendance))
        // Spend
        .route("/spend", get(spend::list_spend))
        .route("/spend", post(spend::create_spend))
        .route("/spend/bulk", post(spend::bulk_create_spend))
        .route("/spend/:id", get(spend::get_spend))
        .route("/spend/:id", put(spend::update_spend))
        .route("/spend/:id", delete(spend::delete_spend))
        // Night rounds
        .route("/night-rounds", get(night_rounds::list_night_rounds))
        .route("/night-rounds", post(night_rounds::create_night_round))
        .route("/night-rounds/latest", get(night_rounds::latest_night_round))
        .route("/night-rounds/bulk", post(night_rounds::bulk_create_night_rounds))
        .route("/night-rounds/:id", put(night_rounds::update_night_round))
        .route("/night-rounds/:id", delete(night_rounds::delete_night_round))
        // Training
        .route("/training", get(training::list_training_reports))
        .route("/training", post(training::create_training_report))
        .route("/training/latest", get(training::latest_training_report))
        .route("/training/bulk", post(training::bulk_create_training_reports))
        .route("/training/:id", delete(training::delete_training_report))
        // Payroll
        .route("/payroll", get(payroll::list_disbursements))
        .route("/payroll", post(payroll::create_disbursement))
        .route("/payroll/status", get(payroll::disbursement_status))
        .route("/payroll/bulk", post(payroll::bulk_create_disbursements))
        .route("/payroll/:id", delete(payroll::delete_disbursement))
        // Complaints
        .route("/complaints", get(complaints::list_complaints))
        .route("/complaints", post(complaints::create_complaint))
        .route("/complaints/:id", put(complaints::update_complaint))
        .route("/complaints/:id", delete(complaints::delete_complaint))
        // Ratings
        .route("/ratings", get(ratings::list_ratings))
        .route("/ratings", post(ratings::create_rating))
        .route("/ratings/admin", post(ratings::create_rating_admin))
        .route("/ratings/bulk", post(ratings::bulk_create_ratings))
        // Billing (/bills is the canonical prefix, /billing kept as an alias)
        .route("/bills/soa", get(billing::statement_of_account))
        .route("/bills", post(billing::create_bill))
        .route("/bills/bulk", post(billing::bulk_create_bills))
        .route("/bills/:id", get(billing::get_bill))
        .route("/bills/:id", put(billing::update_bill))
        .route("/bills/:id", delete(billing::delete_bill))
        .route("/billing/soa", get(billing::statement_of_account))
        .route("/billing", post(billing::create_bill))
        .route("/billing/bulk", post(billing::bulk_create_bills))
        // Reports
        .route("/reports/summary", get(reports::summary));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_body_accepts_both_shapes() {
        let bare: BulkBody<i32> = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(bare.into_items(), vec![1, 2, 3]);

        let wrapped: BulkBody<i32> = serde_json::from_str(r#"{"items": [4, 5]}"#).unwrap();
        assert_eq!(wrapped.into_items(), vec![4, 5]);
    }
}
