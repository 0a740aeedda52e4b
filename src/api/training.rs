//! Training report endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateTrainingReportRequest, Role, TrainingLatestResponse, TrainingReport};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_date, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const READ: &[Role] = &[Role::Admin, Role::Officer, Role::Cro];
const WRITE: &[Role] = &[Role::Admin, Role::Officer, Role::Cro];

const TRAINING_LIST: ListSpec = ListSpec {
    table: "training_reports",
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

fn validate_training(req: &CreateTrainingReportRequest) -> Result<(), ApiError> {
    validate_uuid(&req.site_id, "site_id").map_err(ApiError::validation)?;
    validate_date(&req.date, "date").map_err(ApiError::validation)?;
    if let Some(count) = req.attendance_count {
        if count < 0 {
            return Err(ApiError::validation("attendance_count cannot be negative"));
        }
    }
    Ok(())
}

/// Latest report for a site with the derived topic count; any authenticated
/// role, since the client dashboard shows it.
pub async fn latest_training_report(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Option<TrainingLatestResponse>>, ApiError> {
    let site_id = query
        .site_id
        .ok_or_else(|| ApiError::bad_request("siteId is required"))?;

    let row: Option<TrainingReport> = sqlx::query_as(
        "SELECT * FROM training_reports WHERE site_id = ? ORDER BY date DESC LIMIT 1",
    )
    .bind(&site_id)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(row.map(|report| {
        let topics_covered = report.topics_covered();
        TrainingLatestResponse {
            report,
            topics_covered,
        }
    })))
}

pub async fn list_training_reports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows = query::list_rows::<TrainingReport>(
        &state.db,
        &TRAINING_LIST,
        &query,
        &state.config.pagination,
    )
    .await?;
    Ok(Json(rows))
}

pub async fn create_training_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateTrainingReportRequest>,
) -> Result<(StatusCode, Json<TrainingReport>), ApiError> {
    user.allow(WRITE)?;
    validate_training(&req)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO training_reports (id, site_id, date, topics, attendance_count, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.date)
    .bind(&req.topics)
    .bind(req.attendance_count.unwrap_or(0))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row =
        query::fetch_by_id::<TrainingReport>(&state.db, "training_reports", &id, "Training report")
            .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete_training_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "training_reports", &id, "Training report").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_training_reports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateTrainingReportRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_training(item)?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO training_reports (id, site_id, date, topics, attendance_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.date)
        .bind(&item.topics)
        .bind(item.attendance_count.unwrap_or(0))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}
