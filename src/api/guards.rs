//! Guard roster API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateGuardRequest, Guard, Role, UpdateGuardRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery, ListSpec};
use super::validation::{validate_required, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const READ: &[Role] = &[Role::Admin, Role::Officer, Role::Cro];
const WRITE: &[Role] = &[Role::Admin, Role::Officer];
const DELETE: &[Role] = &[Role::Admin];

const GUARD_LIST: ListSpec = ListSpec {
    table: "guards",
    date_column: "created_at",
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

fn validate_guard(name: Option<&str>, site_id: Option<&str>) -> Result<(), ApiError> {
    if let Some(name) = name {
        validate_required(name, "name").map_err(ApiError::validation)?;
    }
    if let Some(site_id) = site_id {
        validate_uuid(site_id, "site_id").map_err(ApiError::validation)?;
    }
    Ok(())
}

/// List guards with their site names stitched on.
pub async fn list_guards(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    user.allow(READ)?;
    let rows =
        query::list_rows::<Guard>(&state.db, &GUARD_LIST, &query, &state.config.pagination).await?;
    Ok(Json(rows))
}

pub async fn get_guard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Guard>, ApiError> {
    user.allow(READ)?;
    let guard = query::fetch_by_id::<Guard>(&state.db, "guards", &id, "Guard").await?;
    Ok(Json(guard))
}

pub async fn create_guard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateGuardRequest>,
) -> Result<(StatusCode, Json<Guard>), ApiError> {
    user.allow(WRITE)?;
    validate_guard(Some(&req.name), req.site_id.as_deref())?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO guards (id, site_id, name, phone, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.site_id)
    .bind(&req.name)
    .bind(&req.phone)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let guard = query::fetch_by_id::<Guard>(&state.db, "guards", &id, "Guard").await?;
    Ok((StatusCode::CREATED, Json(guard)))
}

pub async fn update_guard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateGuardRequest>,
) -> Result<Json<Guard>, ApiError> {
    user.allow(WRITE)?;
    validate_guard(req.name.as_deref(), req.site_id.as_deref())?;

    let _existing = query::fetch_by_id::<Guard>(&state.db, "guards", &id, "Guard").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE guards SET site_id = COALESCE(?, site_id), name = COALESCE(?, name), \
         phone = COALESCE(?, phone), updated_at = ? WHERE id = ?",
    )
    .bind(&req.site_id)
    .bind(&req.name)
    .bind(&req.phone)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let guard = query::fetch_by_id::<Guard>(&state.db, "guards", &id, "Guard").await?;
    Ok(Json(guard))
}

pub async fn delete_guard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(DELETE)?;
    query::delete_by_id(&state.db, "guards", &id, "Guard").await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Bulk roster import; validated up front and inserted in one transaction.
pub async fn bulk_create_guards(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateGuardRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_guard(Some(&item.name), item.site_id.as_deref())?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        sqlx::query(
            "INSERT INTO guards (id, site_id, name, phone, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&item.site_id)
        .bind(&item.name)
        .bind(&item.phone)
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

    fn finance() -> AuthUser {
        AuthUser {
            id: "fin-1".into(),
            role: "FINANCE".into(),
            name: "Finance".into(),
            email: "finance@x.co".into(),
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

    #[tokio::test]
    async fn test_guard_list_is_enriched() {
        let state = test_state().await;
        seed_site(&state, "s1", "Alpha Tower").await;

        create_guard(
            State(state.clone()),
            officer(),
            Json(CreateGuardRequest {
                site_id: Some("s1".into()),
                name: "Ravi".into(),
                phone: Some("9000000001".into()),
            }),
        )
        .await
        .unwrap();

        let rows = list_guards(State(state.clone()), officer(), Query(ListQuery::default()))
            .await
            .unwrap();
        assert_eq!(rows.0.len(), 1);
        assert_eq!(rows.0[0]["site_name"], "Alpha Tower");
    }

    #[tokio::test]
    async fn test_guard_roles() {
        let state = test_state().await;
        let err = list_guards(State(state.clone()), finance(), Query(ListQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        // Officers may create but not delete
        let (_, guard) = create_guard(
            State(state.clone()),
            officer(),
            Json(CreateGuardRequest {
                site_id: None,
                name: "Kumar".into(),
                phone: None,
            }),
        )
        .await
        .unwrap();
        let err = delete_guard(State(state.clone()), officer(), Path(guard.0.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bulk_create_guards_is_atomic() {
        let state = test_state().await;
        let body = BulkBody::Wrapped {
            items: vec![
                CreateGuardRequest {
                    site_id: None,
                    name: "A".into(),
                    phone: None,
                },
                CreateGuardRequest {
                    site_id: None,
                    name: "   ".into(), // fails validation
                    phone: None,
                },
            ],
        };
        let err = bulk_create_guards(State(state.clone()), officer(), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        // Nothing was inserted
        let rows = list_guards(State(state.clone()), officer(), Query(ListQuery::default()))
            .await
            .unwrap();
        assert!(rows.0.is_empty());
    }
}
