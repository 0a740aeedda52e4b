//! Salary disbursement endpoints. Months are normalized to the first of
//! month so YYYY-MM and full dates from different clients land identically.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateDisbursementRequest, Role, SalaryDisbursement, DISBURSEMENT_STATUSES};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{normalize_month, validate_date, validate_one_of, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const STATUS_READ: &[Role] = &[Role::Client, Role::Admin, Role::Finance];
const READ: &[Role] = &[Role::Admin, Role::Finance];
const WRITE: &[Role] = &[Role::Admin, Role::Finance];

const PAYROLL_LIST: ListSpec = ListSpec {
    table: "salary_disbursements",
    date_column: "month",
    filters: &[("site_id", "site_id"), ("status", "status")],
    enrich: &[EnrichSpec {
        fk_field: "site_id",
        ref_table: "sites",
        ref_column: "name",
        out_field: "site_name",
        alt: None,
        fallback: "Unknown site",
    }],
};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(alias = "siteId")]
    pub site_id: Option<String>,
    /// YYYY-MM
    pub month: Option<String>,
}

fn validate_disbursement(req: &CreateDisbursementRequest) -> Result<String, ApiError> {
    validate_uuid(&req.site_id, "site_id").map_err(ApiError::validation)?;
    validate_one_of(&req.status, &DISBURSEMENT_STATUSES, "status").map_err(ApiError::validation)?;
    if let Some(date_paid) = &req.date_paid {
        validate_date(date_paid, "date_paid").map_err(ApiError::validation)?;
    }
    normalize_month(&req.month).map_err(ApiError::validation)
}

/// Latest disbursement for a site, optionally pinned to a month.
pub async fn disbursement_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Option<SalaryDisbursement>>, ApiError> {
    user.allow(STATUS_READ)?;
    let site_id = query
        .site_id
        .ok_or_else(|| ApiError::bad_request("siteId is required"))?;

    let row: Option<SalaryDisbursement> = match &query.month {
        Some(month) => {
            let month = normalize_month(month).map_err(ApiError::validation)?;
            sqlx::query_as(
                "SELECT * FROM salary_disbursements WHERE site_id = ? AND month = ? \
                 ORDER BY month DESC LIMIT 1",
            )
            .bind(&site_id)
            .bind(&month)
            .fetch_optional(&state.db)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM salary_disbursements WHERE site_id = ? ORDER BY month DESC LIMIT 1",
            )
            .bind(&site_id)
            .fetch_optional(&state.db)
            .await?
        }
    };

    Ok(Json(row))
}

pub async fn list_disbursements(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows = query::list_rows::<SalaryDisbursement>(
        &state.db,
        &PAYROLL_LIST,
        &query,
        &state.config.pagination,
    )
    .await?;
    Ok(Json(rows))
}

pub async fn create_disbursement(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateDisbursementRequest>,
) -> Result<(StatusCode, Json<SalaryDisbursement>), ApiError> {
    user.allow(WRITE)?;
    let month = validate_disbursement(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO salary_disbursements (id, site_id, month, status, date_paid, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&month)
    .bind(&req.status)
    .bind(&req.date_paid)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<SalaryDisbursement>(
        &state.db,
        "salary_disbursements",
        &id,
        "Disbursement",
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete_disbursement(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "salary_disbursements", &id, "Disbursement").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_disbursements(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateDisbursementRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }

    let mut normalized = Vec::with_capacity(items.len());
    for item in &items {
        normalized.push(validate_disbursement(item)?);
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for (item, month) in items.iter().zip(normalized) {
        sqlx::query(
            "INSERT INTO salary_disbursements (id, site_id, month, status, date_paid, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&month)
        .bind(&item.status)
        .bind(&item.date_paid)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
