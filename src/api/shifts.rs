//! Shift coverage endpoints. The dashboard reads aggregated views of the
//! latest recorded day; raw rows stay available for back-office screens.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateShiftRequest, Role, Shift, ShiftAggregate, SHIFT_TYPES};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, ListQuery, ListSpec};
use super::validation::{validate_date, validate_one_of, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const WRITE: &[Role] = &[Role::Admin, Role::Officer];

const SHIFT_LIST: ListSpec = ListSpec {
    table: "shifts",
    date_column: "date",
    filters: &[("site_id", "site_id")],
    enrich: &[],
};

fn validate_shift(req: &CreateShiftRequest) -> Result<(), ApiError> {
    validate_uuid(&req.site_id, "site_id").map_err(ApiError::validation)?;
    validate_date(&req.date, "date").map_err(ApiError::validation)?;
    validate_one_of(&req.shift_type, &SHIFT_TYPES, "shift_type").map_err(ApiError::validation)?;
    if req.guard_count < 0 {
        return Err(ApiError::validation("guard_count cannot be negative"));
    }
    Ok(())
}

/// Rows belonging to the most recent date present in a date-descending list.
fn latest_day<'a>(rows: &'a [Shift]) -> &'a [Shift] {
    match rows.first() {
        Some(first) => {
            let latest = &first.date;
            let end = rows.iter().take_while(|r| &r.date == latest).count();
            &rows[..end]
        }
        None => &[],
    }
}

/// Per-shift-type guard totals for the latest recorded day.
fn aggregate_by_type(rows: &[Shift]) -> Vec<ShiftAggregate> {
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    for row in latest_day(rows) {
        *totals.entry(row.shift_type.clone()).or_insert(0) += row.guard_count;
    }
    totals
        .into_iter()
        .map(|(shift, guards)| ShiftAggregate { shift, guards })
        .collect()
}

async fn fetch_site_shifts(
    state: &Arc<AppState>,
    site_id: Option<&str>,
) -> Result<Vec<Shift>, ApiError> {
    let site_id = site_id.ok_or_else(|| ApiError::bad_request("siteId is required"))?;
    let rows: Vec<Shift> = sqlx::query_as(
        "SELECT * FROM shifts WHERE site_id = ? ORDER BY date DESC LIMIT ?",
    )
    .bind(site_id)
    .bind(state.config.pagination.max_limit as i64)
    .fetch_all(&state.db)
    .await?;
    Ok(rows)
}

/// Latest-day guard counts grouped by shift type. Any authenticated role.
pub async fn latest_day_breakdown(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ShiftAggregate>>, ApiError> {
    let rows = fetch_site_shifts(&state, query.site_id.as_deref()).await?;
    Ok(Json(aggregate_by_type(&rows)))
}

/// Total guards fielded on the latest recorded day.
pub async fn latest_day_total(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = fetch_site_shifts(&state, query.site_id.as_deref()).await?;
    let total: i64 = latest_day(&rows).iter().map(|r| r.guard_count).sum();
    Ok(Json(serde_json::json!({ "shiftWiseCount": total })))
}

/// Raw shift rows for back-office use.
pub async fn list_shifts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(WRITE)?;
    let rows =
        query::list_rows::<Shift>(&state.db, &SHIFT_LIST, &query, &state.config.pagination).await?;
    Ok(Json(rows))
}

pub async fn create_shift(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateShiftRequest>,
) -> Result<(StatusCode, Json<Shift>), ApiError> {
    user.allow(WRITE)?;
    validate_shift(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO shifts (id, site_id, date, shift_type, guard_count, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.date)
    .bind(&req.shift_type)
    .bind(req.guard_count)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let shift = query::fetch_by_id::<Shift>(&state.db, "shifts", &id, "Shift").await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

pub async fn update_shift(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateShiftRequest>,
) -> Result<Json<Shift>, ApiError> {
    user.allow(WRITE)?;
    validate_shift(&req)?;

    let _existing = query::fetch_by_id::<Shift>(&state.db, "shifts", &id, "Shift").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE shifts SET site_id = ?, date = ?, shift_type = ?, guard_count = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&req.site_id)
    .bind(&req.date)
    .bind(&req.shift_type)
    .bind(req.guard_count)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let shift = query::fetch_by_id::<Shift>(&state.db, "shifts", &id, "Shift").await?;
    Ok(Json(shift))
}

pub async fn delete_shift(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "shifts", &id, "Shift").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_shifts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateShiftRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_shift(item)?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO shifts (id, site_id, date, shift_type, guard_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.date)
        .bind(&item.shift_type)
        .bind(item.guard_count)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
