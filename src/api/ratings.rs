//! Monthly satisfaction rating endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateRatingAdminRequest, CreateRatingRequest, Rating, Role};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{normalize_month, validate_rating_value, validate_uuid};
use super::{BulkBody, InsertedResponse};

const READ: &[Role] = &[Role::Client, Role::Admin, Role::Cro];
const FILE: &[Role] = &[Role::Client];
const ADMIN_FILE: &[Role] = &[Role::Admin, Role::Cro];

const RATING_LIST: ListSpec = ListSpec {
    table: "ratings",
    date_column: "month",
    filters: &[("site_id", "site_id"), ("client_id", "client_id")],
    enrich: &[
        EnrichSpec {
            fk_field: "site_id",
            ref_table: "sites",
            ref_column: "name",
            out_field: "site_name",
            alt: None,
            fallback: "Unknown site",
        },
        EnrichSpec {
            fk_field: "client_id",
            ref_table: "users",
            ref_column: "name",
            out_field: "client_name",
            alt: None,
            fallback: "Unknown client",
        },
    ],
};

pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows =
        query::list_rows::<Rating>(&state.db, &RATING_LIST, &query, &state.config.pagination)
            .await?;
    Ok(Json(rows))
}

async fn insert_rating(
    state: &Arc<AppState>,
    site_id: &str,
    client_id: Option<&str>,
    month: &str,
    rating_value: i64,
    nps_score: Option<i64>,
) -> Result<Rating, ApiError> {
    validate_uuid(site_id, "site_id").map_err(ApiError::validation)?;
    validate_rating_value(rating_value).map_err(ApiError::validation)?;
    let month = normalize_month(month).map_err(ApiError::validation)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO ratings (id, site_id, client_id, month, rating_value, nps_score, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(site_id)
    .bind(client_id)
    .bind(&month)
    .bind(rating_value)
    .bind(nps_score)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    query::fetch_by_id::<Rating>(&state.db, "ratings", &id, "Rating").await
}

/// Client files a rating for one of their sites; identity from the token.
pub async fn create_rating(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateRatingRequest>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
    user.allow(FILE)?;
    let row = insert_rating(
        &state,
        &req.site_id,
        Some(&user.id),
        &req.month,
        req.rating_value,
        req.nps_score,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Back-office entry of a rating collected offline, on behalf of a client.
pub async fn create_rating_admin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateRatingAdminRequest>,
) -> Result<(StatusCode, Json<Rating>), ApiError> {
    user.allow(ADMIN_FILE)?;
    let row = insert_rating(
        &state,
        &req.site_id,
        req.client_id.as_deref(),
        &req.month,
        req.rating_value,
        req.nps_score,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn bulk_create_ratings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateRatingAdminRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(ADMIN_FILE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }

    let mut months = Vec::with_capacity(items.len());
    for item in &items {
        validate_uuid(&item.site_id, "site_id").map_err(ApiError::validation)?;
        validate_rating_value(item.rating_value).map_err(ApiError::validation)?;
        months.push(normalize_month(&item.month).map_err(ApiError::validation)?);
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for (item, month) in items.iter().zip(months) {
        sqlx::query(
            "INSERT INTO ratings (id, site_id, client_id, month, rating_value, nps_score, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.client_id)
        .bind(&month)
        .bind(item.rating_value)
        .bind(item.nps_score)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
