//! Night patrol round endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateNightRoundRequest, NightRound, Role, UpdateNightRoundRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_date, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const LATEST_READ: &[Role] = &[Role::Client, Role::Admin, Role::Officer, Role::Cro];
const READ: &[Role] = &[Role::Admin, Role::Officer, Role::Cro];
const WRITE: &[Role] = &[Role::Admin, Role::Officer];

const NIGHT_ROUND_LIST: ListSpec = ListSpec {
    table: "night_rounds",
    date_column: "date",
    filters: &[("site_id", "site_id")],
    enrich: &[EnrichSpec {
        fk_field: "officer_id",
        ref_table: "users",
        ref_column: "name",
        out_field: "officer_name",
        alt: None,
        fallback: "Unknown officer",
    }],
};

fn validate_night_round(
    site_id: Option<&str>,
    date: Option<&str>,
    officer_id: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(site_id) = site_id {
        validate_uuid(site_id, "site_id").map_err(ApiError::validation)?;
    }
    if let Some(date) = date {
        validate_date(date, "date").map_err(ApiError::validation)?;
    }
    if let Some(officer_id) = officer_id {
        validate_uuid(officer_id, "officer_id").map_err(ApiError::validation)?;
    }
    Ok(())
}

/// Most recent round for a site, or null when none exist.
pub async fn latest_night_round(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Option<NightRound>>, ApiError> {
    user.allow(LATEST_READ)?;
    let site_id = query
        .site_id
        .ok_or_else(|| ApiError::bad_request("siteId is required"))?;

    let row: Option<NightRound> =
        sqlx::query_as("SELECT * FROM night_rounds WHERE site_id = ? ORDER BY date DESC LIMIT 1")
            .bind(&site_id)
            .fetch_optional(&state.db)
            .await?;
    Ok(Json(row))
}

pub async fn list_night_rounds(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows = query::list_rows::<NightRound>(
        &state.db,
        &NIGHT_ROUND_LIST,
        &query,
        &state.config.pagination,
    )
    .await?;
    Ok(Json(rows))
}

pub async fn create_night_round(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateNightRoundRequest>,
) -> Result<(StatusCode, Json<NightRound>), ApiError> {
    user.allow(WRITE)?;
    validate_night_round(Some(&req.site_id), Some(&req.date), req.officer_id.as_deref())?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO night_rounds (id, site_id, date, officer_id, findings, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.date)
    .bind(&req.officer_id)
    .bind(&req.findings)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<NightRound>(&state.db, "night_rounds", &id, "Night round").await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_night_round(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateNightRoundRequest>,
) -> Result<Json<NightRound>, ApiError> {
    user.allow(WRITE)?;
    validate_night_round(None, req.date.as_deref(), req.officer_id.as_deref())?;

    let _existing =
        query::fetch_by_id::<NightRound>(&state.db, "night_rounds", &id, "Night round").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE night_rounds SET date = COALESCE(?, date), officer_id = COALESCE(?, officer_id), \
         findings = COALESCE(?, findings), updated_at = ? WHERE id = ?",
    )
    .bind(&req.date)
    .bind(&req.officer_id)
    .bind(&req.findings)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<NightRound>(&state.db, "night_rounds", &id, "Night round").await?;
    Ok(Json(row))
}

pub async fn delete_night_round(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "night_rounds", &id, "Night round").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_night_rounds(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateNightRoundRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_night_round(Some(&item.site_id), Some(&item.date), item.officer_id.as_deref())?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO night_rounds (id, site_id, date, officer_id, findings, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.date)
        .bind(&item.officer_id)
        .bind(&item.findings)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
