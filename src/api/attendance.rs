//! Attendance endpoints. Rows reference guards weakly; the list view stitches
//! guard names on, falling back to user accounts for ids that predate the
//! roster.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    Attendance, CreateAttendanceRequest, Role, UpdateAttendanceRequest, ATTENDANCE_STATUSES,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_date, validate_one_of, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const READ: &[Role] = &[Role::Client, Role::Admin, Role::Officer];
const WRITE: &[Role] = &[Role::Admin, Role::Officer, Role::Cro];

const ATTENDANCE_LIST: ListSpec = ListSpec {
    table: "attendance",
    date_column: "date",
    filters: &[("site_id", "site_id"), ("status", "status")],
    enrich: &[
        EnrichSpec {
            fk_field: "guard_id",
            ref_table: "guards",
            ref_column: "name",
            out_field: "guard_name",
            alt: Some(("users", "name")),
            fallback: "Unknown guard",
        },
        EnrichSpec {
            fk_field: "site_id",
            ref_table: "sites",
            ref_column: "name",
            out_field: "site_name",
            alt: None,
            fallback: "Unknown site",
        },
    ],
};

fn validate_attendance(
    site_id: Option<&str>,
    date: Option<&str>,
    status: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(site_id) = site_id {
        validate_uuid(site_id, "site_id").map_err(ApiError::validation)?;
    }
    if let Some(date) = date {
        validate_date(date, "date").map_err(ApiError::validation)?;
    }
    if let Some(status) = status {
        validate_one_of(status, &ATTENDANCE_STATUSES, "status").map_err(ApiError::validation)?;
    }
    Ok(())
}

pub async fn list_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows = query::list_rows::<Attendance>(
        &state.db,
        &ATTENDANCE_LIST,
        &query,
        &state.config.pagination,
    )
    .await?;
    Ok(Json(rows))
}

pub async fn get_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Attendance>, ApiError> {
    user.allow(READ)?;
    let row = query::fetch_by_id::<Attendance>(&state.db, "attendance", &id, "Attendance").await?;
    Ok(Json(row))
}

pub async fn create_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateAttendanceRequest>,
) -> Result<(StatusCode, Json<Attendance>), ApiError> {
    user.allow(WRITE)?;
    validate_attendance(Some(&req.site_id), Some(&req.date), req.status.as_deref())?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let status = req.status.as_deref().unwrap_or("PRESENT");

    sqlx::query(
        "INSERT INTO attendance (id, site_id, guard_id, date, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.guard_id)
    .bind(&req.date)
    .bind(status)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Attendance>(&state.db, "attendance", &id, "Attendance").await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateAttendanceRequest>,
) -> Result<Json<Attendance>, ApiError> {
    user.allow(WRITE)?;
    validate_attendance(None, req.date.as_deref(), req.status.as_deref())?;

    let _existing =
        query::fetch_by_id::<Attendance>(&state.db, "attendance", &id, "Attendance").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE attendance SET guard_id = COALESCE(?, guard_id), date = COALESCE(?, date), \
         status = COALESCE(?, status), updated_at = ? WHERE id = ?",
    )
    .bind(&req.guard_id)
    .bind(&req.date)
    .bind(&req.status)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Attendance>(&state.db, "attendance", &id, "Attendance").await?;
    Ok(Json(row))
}

pub async fn delete_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "attendance", &id, "Attendance").await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Bulk attendance capture, one transaction for the whole sheet.
pub async fn bulk_create_attendance(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateAttendanceRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_attendance(Some(&item.site_id), Some(&item.date), item.status.as_deref())?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO attendance (id, site_id, guard_id, date, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.guard_id)
        .bind(&item.date)
        .bind(item.status.as_deref().unwrap_or("PRESENT"))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::open_test_pool;

    fn officer() -> AuthUser {
        AuthUser {
            id: "off-1".into(),
            role: "OFFICER".into(),
            name: "Officer".into(),
            email: "officer@x.co".into(),
        }
    }

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), open_test_pool().await))
    }

    async fn seed_site(state: &Arc<AppState>, id: &str, name: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO sites (id, name, strength, rate_per_guard, created_at, updated_at) \
             VALUES (?, ?, 2, 100.0, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await
        .unwrap();
    }

    async fn seed_guard(state: &Arc<AppState>, id: &str, site_id: &str, name: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO guards (id, site_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(site_id)
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_site_guard_attendance_flow() {
        let state = test_state().await;
        let site_id = "550e8400-e29b-41d4-a716-446655440000";
        seed_site(&state, site_id, "Alpha Tower").await;
        seed_guard(&state, "g1", site_id, "Ravi").await;

        let (status, row) = create_attendance(
            State(state.clone()),
            officer(),
            Json(CreateAttendanceRequest {
                site_id: site_id.into(),
                guard_id: Some("g1".into()),
                date: "2025-03-02".into(),
                status: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(row.0.status, "PRESENT"); // default applied

        let rows = list_attendance(
            State(state.clone()),
            officer(),
            Query(ListQuery {
                site_id: Some(site_id.into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.0.len(), 1);
        assert_eq!(rows.0[0]["guard_name"], "Ravi");
        assert_eq!(rows.0[0]["site_name"], "Alpha Tower");
    }

    #[tokio::test]
    async fn test_status_filter_and_validation() {
        let state = test_state().await;
        let site_id = "550e8400-e29b-41d4-a716-446655440000";
        seed_site(&state, site_id, "Alpha Tower").await;

        for (date, status) in [("2025-03-01", "PRESENT"), ("2025-03-02", "ABSENT")] {
            create_attendance(
                State(state.clone()),
                officer(),
                Json(CreateAttendanceRequest {
                    site_id: site_id.into(),
                    guard_id: None,
                    date: date.into(),
                    status: Some(status.into()),
                }),
            )
            .await
            .unwrap();
        }

        let absents = list_attendance(
            State(state.clone()),
            officer(),
            Query(ListQuery {
                site_id: Some(site_id.into()),
                status: Some("ABSENT".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(absents.0.len(), 1);
        assert_eq!(absents.0[0]["status"], "ABSENT");

        let err = create_attendance(
            State(state.clone()),
            officer(),
            Json(CreateAttendanceRequest {
                site_id: site_id.into(),
                guard_id: None,
                date: "2025-03-03".into(),
                status: Some("AWOL".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
