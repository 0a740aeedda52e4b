//! Site API endpoints. Sites anchor every other resource; deleting one
//! cascades through the child tables.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateSiteRequest, Role, Site, SiteUpsert, UpdateSiteRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, ListQuery, ListSpec};
use super::validation::{validate_date, validate_required, validate_uuid};
use super::{BulkBody, OkResponse, UpsertedResponse};

const READ: &[Role] = &[Role::Client, Role::Admin, Role::Officer, Role::Cro, Role::Finance];
const WRITE: &[Role] = &[Role::Admin, Role::Cro];

const SITE_LIST: ListSpec = ListSpec {
    table: "sites",
    date_column: "created_at",
    filters: &[("client_id", "client_id")],
    enrich: &[],
};

fn validate_site_fields(
    name: Option<&str>,
    client_id: Option<&str>,
    agreement_start: Option<&str>,
    agreement_end: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(name) = name {
        validate_required(name, "name").map_err(ApiError::validation)?;
    }
    if let Some(client_id) = client_id {
        validate_uuid(client_id, "client_id").map_err(ApiError::validation)?;
    }
    if let Some(start) = agreement_start {
        validate_date(start, "agreement_start").map_err(ApiError::validation)?;
    }
    if let Some(end) = agreement_end {
        validate_date(end, "agreement_end").map_err(ApiError::validation)?;
    }
    Ok(())
}

/// List sites, optionally filtered by owning client. Any authenticated role.
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let rows =
        query::list_rows::<Site>(&state.db, &SITE_LIST, &query, &state.config.pagination).await?;
    Ok(Json(rows))
}

pub async fn get_site(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Site>, ApiError> {
    user.allow(READ)?;
    let site = query::fetch_by_id::<Site>(&state.db, "sites", &id, "Site").await?;
    Ok(Json(site))
}

pub async fn create_site(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateSiteRequest>,
) -> Result<(StatusCode, Json<Site>), ApiError> {
    user.allow(WRITE)?;
    validate_site_fields(
        Some(&req.name),
        req.client_id.as_deref(),
        req.agreement_start.as_deref(),
        req.agreement_end.as_deref(),
    )?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO sites (id, name, location, strength, rate_per_guard,
            agreement_start, agreement_end, area_officer_name, area_officer_phone,
            cro_name, cro_phone, client_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.location)
    .bind(req.strength.unwrap_or(0))
    .bind(req.rate_per_guard.unwrap_or(0.0))
    .bind(&req.agreement_start)
    .bind(&req.agreement_end)
    .bind(&req.area_officer_name)
    .bind(&req.area_officer_phone)
    .bind(&req.cro_name)
    .bind(&req.cro_phone)
    .bind(&req.client_id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let site = query::fetch_by_id::<Site>(&state.db, "sites", &id, "Site").await?;
    Ok((StatusCode::CREATED, Json(site)))
}

pub async fn update_site(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<Json<Site>, ApiError> {
    user.allow(WRITE)?;
    validate_site_fields(
        req.name.as_deref(),
        req.client_id.as_deref(),
        req.agreement_start.as_deref(),
        req.agreement_end.as_deref(),
    )?;

    let _existing = query::fetch_by_id::<Site>(&state.db, "sites", &id, "Site").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE sites SET
            name = COALESCE(?, name),
            location = COALESCE(?, location),
            strength = COALESCE(?, strength),
            rate_per_guard = COALESCE(?, rate_per_guard),
            agreement_start = COALESCE(?, agreement_start),
            agreement_end = COALESCE(?, agreement_end),
            area_officer_name = COALESCE(?, area_officer_name),
            area_officer_phone = COALESCE(?, area_officer_phone),
            cro_name = COALESCE(?, cro_name),
            cro_phone = COALESCE(?, cro_phone),
            client_id = COALESCE(?, client_id),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.location)
    .bind(req.strength)
    .bind(req.rate_per_guard)
    .bind(&req.agreement_start)
    .bind(&req.agreement_end)
    .bind(&req.area_officer_name)
    .bind(&req.area_officer_phone)
    .bind(&req.cro_name)
    .bind(&req.cro_phone)
    .bind(&req.client_id)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let site = query::fetch_by_id::<Site>(&state.db, "sites", &id, "Site").await?;
    Ok(Json(site))
}

/// Delete a site; all dependent rows go with it via the cascade constraints.
pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "sites", &id, "Site").await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Bulk upsert: rows carrying an id update in place, the rest insert fresh.
/// The whole batch commits or rolls back as one transaction.
pub async fn bulk_upsert_sites(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<SiteUpsert>>,
) -> Result<(StatusCode, Json<UpsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }

    for item in &items {
        validate_site_fields(
            Some(&item.name),
            item.client_id.as_deref(),
            item.agreement_start.as_deref(),
            item.agreement_end.as_deref(),
        )?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        let id = item.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        sqlx::query(
            r#"
            INSERT INTO sites (id, name, location, strength, rate_per_guard,
                agreement_start, agreement_end, area_officer_name, area_officer_phone,
                cro_name, cro_phone, client_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                location = excluded.location,
                strength = excluded.strength,
                rate_per_guard = excluded.rate_per_guard,
                agreement_start = excluded.agreement_start,
                agreement_end = excluded.agreement_end,
                area_officer_name = excluded.area_officer_name,
                area_officer_phone = excluded.area_officer_phone,
                cro_name = excluded.cro_name,
                cro_phone = excluded.cro_phone,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&item.name)
        .bind(&item.location)
        .bind(item.strength.unwrap_or(0))
        .bind(item.rate_per_guard.unwrap_or(0.0))
        .bind(&item.agreement_start)
        .bind(&item.agreement_end)
        .bind(&item.area_officer_name)
        .bind(&item.area_officer_phone)
        .bind(&item.cro_name)
        .bind(&item.cro_phone)
        .bind(&item.client_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(UpsertedResponse { upserted: count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::open_test_pool;

    fn admin() -> AuthUser {
        AuthUser {
            id: "admin-1".into(),
            role: "ADMIN".into(),
            name: "Admin".into(),
            email: "admin@x.co".into(),
        }
    }

    fn client() -> AuthUser {
        AuthUser {
            id: "client-1".into(),
            role: "CLIENT".into(),
            name: "Client".into(),
            email: "client@x.co".into(),
        }
    }

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), open_test_pool().await))
    }

    fn site_request(name: &str) -> CreateSiteRequest {
        CreateSiteRequest {
            name: name.into(),
            location: Some("Sector 9".into()),
            strength: Some(6),
            rate_per_guard: Some(150.0),
            agreement_start: Some("2025-01-01".into()),
            agreement_end: Some("2025-12-31".into()),
            area_officer_name: None,
            area_officer_phone: None,
            cro_name: None,
            cro_phone: None,
            client_id: None,
        }
    }

    #[tokio::test]
    async fn test_site_crud_round_trip() {
        let state = test_state().await;

        let (status, site) = create_site(
            State(state.clone()),
            admin(),
            Json(site_request("Alpha Tower")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(site.0.strength, 6);

        let fetched = get_site(State(state.clone()), client(), Path(site.0.id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.0.name, "Alpha Tower");

        let updated = update_site(
            State(state.clone()),
            admin(),
            Path(site.0.id.clone()),
            Json(UpdateSiteRequest {
                name: None,
                location: Some("Sector 12".into()),
                strength: Some(8),
                rate_per_guard: None,
                agreement_start: None,
                agreement_end: None,
                area_officer_name: None,
                area_officer_phone: None,
                cro_name: None,
                cro_phone: None,
                client_id: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.0.name, "Alpha Tower");
        assert_eq!(updated.0.strength, 8);
        assert_eq!(updated.0.location.as_deref(), Some("Sector 12"));

        delete_site(State(state.clone()), admin(), Path(site.0.id.clone()))
            .await
            .unwrap();
        let missing = get_site(State(state.clone()), admin(), Path(site.0.id)).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_site_write_requires_admin_or_cro() {
        let state = test_state().await;
        let err = create_site(State(state.clone()), client(), Json(site_request("X Site")))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bulk_upsert_inserts_and_updates() {
        let state = test_state().await;
        let (_, site) = create_site(
            State(state.clone()),
            admin(),
            Json(site_request("Alpha Tower")),
        )
        .await
        .unwrap();

        let body = BulkBody::List(vec![
            SiteUpsert {
                id: Some(site.0.id.clone()),
                name: "Alpha Tower Renamed".into(),
                location: None,
                strength: Some(10),
                rate_per_guard: None,
                agreement_start: None,
                agreement_end: None,
                area_officer_name: None,
                area_officer_phone: None,
                cro_name: None,
                cro_phone: None,
                client_id: None,
            },
            SiteUpsert {
                id: None,
                name: "Beta Mall".into(),
                location: None,
                strength: None,
                rate_per_guard: None,
                agreement_start: None,
                agreement_end: None,
                area_officer_name: None,
                area_officer_phone: None,
                cro_name: None,
                cro_phone: None,
                client_id: None,
            },
        ]);

        let (_, result) = bulk_upsert_sites(State(state.clone()), admin(), Json(body))
            .await
            .unwrap();
        assert_eq!(result.0.upserted, 2);

        let renamed = get_site(State(state.clone()), admin(), Path(site.0.id))
            .await
            .unwrap();
        assert_eq!(renamed.0.name, "Alpha Tower Renamed");

        let all = list_sites(State(state.clone()), admin(), Query(ListQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.0.len(), 2);
    }
}
