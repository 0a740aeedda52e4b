//! Operational spend endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateSpendRequest, Role, Spend, UpdateSpendRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_date, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const READ: &[Role] = &[Role::Client, Role::Admin, Role::Finance];
const WRITE: &[Role] = &[Role::Admin, Role::Finance];

const SPEND_LIST: ListSpec = ListSpec {
    table: "spends",
    date_column: "date",
    filters: &[("site_id", "site_id")],
    enrich: &[EnrichSpec {
        fk_field: "site_id",
        ref_table: "sites",
        ref_column: "name",
        out_field: "site_name",
        alt: None,
        fallback: "Unknown site",
    }],
};

fn validate_spend(site_id: Option<&str>, date: Option<&str>, amount: Option<f64>) -> Result<(), ApiError> {
    if let Some(site_id) = site_id {
        validate_uuid(site_id, "site_id").map_err(ApiError::validation)?;
    }
    if let Some(date) = date {
        validate_date(date, "date").map_err(ApiError::validation)?;
    }
    if let Some(amount) = amount {
        if amount < 0.0 {
            return Err(ApiError::validation("amount cannot be negative"));
        }
    }
    Ok(())
}

pub async fn list_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows =
        query::list_rows::<Spend>(&state.db, &SPEND_LIST, &query, &state.config.pagination).await?;
    Ok(Json(rows))
}

pub async fn get_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Spend>, ApiError> {
    user.allow(READ)?;
    let row = query::fetch_by_id::<Spend>(&state.db, "spends", &id, "Spend").await?;
    Ok(Json(row))
}

pub async fn create_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateSpendRequest>,
) -> Result<(StatusCode, Json<Spend>), ApiError> {
    user.allow(WRITE)?;
    validate_spend(Some(&req.site_id), Some(&req.date), Some(req.amount))?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO spends (id, site_id, date, amount, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.date)
    .bind(req.amount)
    .bind(&req.description)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Spend>(&state.db, "spends", &id, "Spend").await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSpendRequest>,
) -> Result<Json<Spend>, ApiError> {
    user.allow(WRITE)?;
    validate_spend(None, req.date.as_deref(), req.amount)?;

    let _existing = query::fetch_by_id::<Spend>(&state.db, "spends", &id, "Spend").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE spends SET date = COALESCE(?, date), amount = COALESCE(?, amount), \
         description = COALESCE(?, description), updated_at = ? WHERE id = ?",
    )
    .bind(&req.date)
    .bind(req.amount)
    .bind(&req.description)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Spend>(&state.db, "spends", &id, "Spend").await?;
    Ok(Json(row))
}

pub async fn delete_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "spends", &id, "Spend").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_spend(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateSpendRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_spend(Some(&item.site_id), Some(&item.date), Some(item.amount))?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO spends (id, site_id, date, amount, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.date)
        .bind(item.amount)
        .bind(&item.description)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
