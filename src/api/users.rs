//! User administration endpoints. Admin only; password hashes never leave
//! the process.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateUserRequest, Role, UpdateUserRequest, User, UserResponse};
use crate::AppState;

use super::auth::{hash_password, AuthUser};
use super::error::ApiError;
use super::query::{self, ListQuery};
use super::validation::{validate_email, validate_password, validate_required};
use super::OkResponse;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    user.allow(ADMIN_ONLY)?;

    let rows: Vec<User> = match &query.role {
        Some(role) => {
            let role = Role::from_str(role)
                .map_err(|e| ApiError::validation(e))?;
            sqlx::query_as("SELECT * FROM users WHERE role = ? ORDER BY created_at DESC LIMIT ?")
                .bind(role.to_string())
                .bind(query::effective_limit(query.limit, &state.config.pagination))
                .fetch_all(&state.db)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT ?")
                .bind(query::effective_limit(query.limit, &state.config.pagination))
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    user.allow(ADMIN_ONLY)?;
    let found = query::fetch_by_id::<User>(&state.db, "users", &id, "User").await?;
    Ok(Json(UserResponse::from(found)))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    user.allow(ADMIN_ONLY)?;

    validate_required(&req.name, "name").map_err(ApiError::validation)?;
    validate_email(&req.email).map_err(ApiError::validation)?;
    validate_password(&req.password).map_err(ApiError::validation)?;
    let role = Role::from_str(&req.role).map_err(ApiError::validation)?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&req.password)?;

    sqlx::query(
        "INSERT INTO users (id, name, email, phone, role, password_hash, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(role.to_string())
    .bind(&password_hash)
    .bind(req.active.unwrap_or(true))
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created = query::fetch_by_id::<User>(&state.db, "users", &id, "User").await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    user.allow(ADMIN_ONLY)?;

    if let Some(email) = &req.email {
        validate_email(email).map_err(ApiError::validation)?;
    }
    let role = match &req.role {
        Some(r) => Some(Role::from_str(r).map_err(ApiError::validation)?.to_string()),
        None => None,
    };
    let password_hash = match &req.password {
        Some(p) => {
            validate_password(p).map_err(ApiError::validation)?;
            Some(hash_password(p)?)
        }
        None => None,
    };

    let _existing = query::fetch_by_id::<User>(&state.db, "users", &id, "User").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            role = COALESCE(?, role),
            password_hash = COALESCE(?, password_hash),
            active = COALESCE(?, active),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&role)
    .bind(&password_hash)
    .bind(req.active)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let updated = query::fetch_by_id::<User>(&state.db, "users", &id, "User").await?;
    Ok(Json(UserResponse::from(updated)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(ADMIN_ONLY)?;
    query::delete_by_id(&state.db, "users", &id, "User").await?;
    Ok(Json(OkResponse { ok: true }))
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

    fn cro() -> AuthUser {
        AuthUser {
            id: "cro-1".into(),
            role: "CRO".into(),
            name: "Cro".into(),
            email: "cro@x.co".into(),
        }
    }

    async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), open_test_pool().await))
    }

    fn new_user(email: &str, role: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Someone".into(),
            email: email.into(),
            phone: None,
            role: role.into(),
            password: "longenough".into(),
            active: None,
        }
    }

    #[tokio::test]
    async fn test_users_are_admin_only() {
        let state = test_state().await;
        let err = list_users(State(state.clone()), cro(), Query(ListQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_role() {
        let state = test_state().await;
        let err = create_user(
            State(state.clone()),
            admin(),
            Json(new_user("x@crown.example", "SUPERUSER")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_role_filter_and_password_update() {
        let state = test_state().await;
        create_user(
            State(state.clone()),
            admin(),
            Json(new_user("officer@crown.example", "OFFICER")),
        )
        .await
        .unwrap();
        let (_, fin) = create_user(
            State(state.clone()),
            admin(),
            Json(new_user("fin@crown.example", "FINANCE")),
        )
        .await
        .unwrap();

        let officers = list_users(
            State(state.clone()),
            admin(),
            Query(ListQuery {
                role: Some("OFFICER".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(officers.0.len(), 1);
        assert_eq!(officers.0[0].role, "OFFICER");

        let updated = update_user(
            State(state.clone()),
            admin(),
            Path(fin.0.id.clone()),
            Json(UpdateUserRequest {
                name: None,
                email: None,
                phone: None,
                role: None,
                password: Some("rotated-pass".into()),
                active: Some(false),
            }),
        )
        .await
        .unwrap();
        assert!(!updated.0.active);

        // The stored hash verifies against the new password
        let row: User = query::fetch_by_id(&state.db, "users", &fin.0.id, "User")
            .await
            .unwrap();
        assert!(super::super::auth::verify_password("rotated-pass", &row.password_hash));
    }
}
