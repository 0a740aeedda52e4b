//! Client complaint endpoints. Clients file against their own account; CRO
//! and admin staff work the queue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Complaint, CreateComplaintRequest, Role, UpdateComplaintRequest, COMPLAINT_STATUSES};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_one_of, validate_required, validate_uuid};
use super::OkResponse;

const READ: &[Role] = &[Role::Client, Role::Cro, Role::Admin];
const FILE: &[Role] = &[Role::Client];
const RESOLVE: &[Role] = &[Role::Admin, Role::Cro];
const DELETE: &[Role] = &[Role::Admin];

const COMPLAINT_LIST: ListSpec = ListSpec {
    table: "complaints",
    date_column: "created_at",
    filters: &[("site_id", "site_id"), ("status", "status"), ("client_id", "client_id")],
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

pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows = query::list_rows::<Complaint>(
        &state.db,
        &COMPLAINT_LIST,
        &query,
        &state.config.pagination,
    )
    .await?;
    Ok(Json(rows))
}

/// File a complaint. The client id comes from the caller's token, never from
/// the body.
pub async fn create_complaint(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateComplaintRequest>,
) -> Result<(StatusCode, Json<Complaint>), ApiError> {
    user.allow(FILE)?;
    validate_uuid(&req.site_id, "site_id").map_err(ApiError::validation)?;
    validate_required(&req.complaint_text, "complaint_text").map_err(ApiError::validation)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO complaints (id, site_id, client_id, complaint_text, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'OPEN', ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&user.id)
    .bind(&req.complaint_text)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Complaint>(&state.db, "complaints", &id, "Complaint").await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Work a complaint: edit the text or flip OPEN to RESOLVED.
pub async fn update_complaint(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateComplaintRequest>,
) -> Result<Json<Complaint>, ApiError> {
    user.allow(RESOLVE)?;
    if let Some(status) = &req.status {
        validate_one_of(status, &COMPLAINT_STATUSES, "status").map_err(ApiError::validation)?;
    }

    let _existing =
        query::fetch_by_id::<Complaint>(&state.db, "complaints", &id, "Complaint").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE complaints SET status = COALESCE(?, status), \
         complaint_text = COALESCE(?, complaint_text), updated_at = ? WHERE id = ?",
    )
    .bind(&req.status)
    .bind(&req.complaint_text)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let row = query::fetch_by_id::<Complaint>(&state.db, "complaints", &id, "Complaint").await?;
    Ok(Json(row))
}

pub async fn delete_complaint(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(DELETE)?;
    query::delete_by_id(&state.db, "complaints", &id, "Complaint").await?;
    Ok(Json(OkResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::open_test_pool;

    fn client() -> AuthUser {
        AuthUser {
            id: "client-7".into(),
            role: "CLIENT".into(),
            name: "Client".into(),
            email: "client@x.co".into(),
        }
    }

    fn cro() -> AuthUser {
        AuthUser {
            id: "cro-1".into(),
            role: "CRO".into(),
            name: "Cro".into(),
            email: "cro@x.co".into(),
        }
    }

    async fn test_state() -> Arc<AppState> {
        let state = Arc::new(AppState::new(Config::default(), open_test_pool().await));
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO sites (id, name, strength, rate_per_guard, created_at, updated_at) \
             VALUES ('550e8400-e29b-41d4-a716-446655440000', 'Alpha Tower', 2, 100.0, ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await
        .unwrap();
        state
    }

    #[tokio::test]
    async fn test_complaint_lifecycle() {
        let state = test_state().await;

        // Only clients may file
        let err = create_complaint(
            State(state.clone()),
            cro(),
            Json(CreateComplaintRequest {
                site_id: "550e8400-e29b-41d4-a716-446655440000".into(),
                complaint_text: "Gate left open".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let (_, complaint) = create_complaint(
            State(state.clone()),
            client(),
            Json(CreateComplaintRequest {
                site_id: "550e8400-e29b-41d4-a716-446655440000".into(),
                complaint_text: "Gate left open".into(),
            }),
        )
        .await
        .unwrap();
        // client_id is taken from the token
        assert_eq!(complaint.0.client_id.as_deref(), Some("client-7"));
        assert_eq!(complaint.0.status, "OPEN");

        // Clients cannot resolve; CRO can
        let err = update_complaint(
            State(state.clone()),
            client(),
            Path(complaint.0.id.clone()),
            Json(UpdateComplaintRequest {
                status: Some("RESOLVED".into()),
                complaint_text: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let resolved = update_complaint(
            State(state.clone()),
            cro(),
            Path(complaint.0.id.clone()),
            Json(UpdateComplaintRequest {
                status: Some("RESOLVED".into()),
                complaint_text: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(resolved.0.status, "RESOLVED");
    }
}
