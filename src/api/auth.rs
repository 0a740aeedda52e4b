//! Authentication: login/signup, password reset lifecycle, and the
//! bearer-token extractor used by every protected route.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{
    DbPool, ForgotPasswordRequest, LoginRequest, LoginResponse, PasswordResetToken,
    RefreshRequest, ResetPasswordRequest, Role, SignupRequest, User, UserResponse,
};
use crate::AppState;

use super::error::ApiError;
use super::tokens::{generate_reset_token, hash_token};
use super::validation::{validate_email, validate_password, validate_required};
use super::OkResponse;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to hash password")
        })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Identity resolved from the Authorization header.
///
/// Extraction fails with 401 when the header is missing or the token does not
/// verify; role checks happen afterwards via [`AuthUser::allow`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: String,
    pub name: String,
    pub email: String,
}

impl AuthUser {
    /// Enforce the route's static role allowlist. Roles that fail to parse
    /// are rejected like any role outside the list.
    pub fn allow(&self, roles: &[Role]) -> Result<(), ApiError> {
        match Role::from_str(&self.role) {
            Ok(role) if roles.contains(&role) => Ok(()),
            _ => Err(ApiError::forbidden()),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::unauthorized)?;
        let claims = state.tokens.verify_access(&token)?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
            name: claims.name,
            email: claims.email,
        })
    }
}

/// Login endpoint. Unknown email and wrong password produce the identical
/// generic error so the response does not reveal which field was wrong.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let access_token = state.tokens.issue_access(&user)?;
    let refresh_token = state.tokens.issue_refresh(&user)?;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user: UserResponse::from(user),
    }))
}

/// Self-service signup. New accounts always get the CLIENT role.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_required(&request.name, "name").map_err(ApiError::validation)?;
    validate_email(&request.email).map_err(ApiError::validation)?;
    validate_password(&request.password).map_err(ApiError::validation)?;

    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&request.password)?;

    sqlx::query(
        "INSERT INTO users (id, name, email, phone, role, password_hash, active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(Role::Client.to_string())
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("New client signup: {}", user.email);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Create a reset token row for a user and return the raw token.
///
/// Expired and consumed rows are purged opportunistically so the table does
/// not grow without bound.
pub async fn issue_reset_token(
    pool: &DbPool,
    user_id: &str,
    ttl_secs: i64,
) -> Result<String, ApiError> {
    let now = chrono::Utc::now();

    sqlx::query("DELETE FROM password_reset_tokens WHERE consumed = 1 OR expires_at < ?")
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    let raw = generate_reset_token();
    let expires_at = now + chrono::Duration::seconds(ttl_secs);

    sqlx::query(
        "INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, consumed, created_at) \
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(hash_token(&raw))
    .bind(expires_at.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(raw)
}

/// Request a password reset. Always answers `{ok: true}` so the endpoint
/// cannot be used to probe which emails have accounts.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    if let Some(user) = user {
        let raw = issue_reset_token(&state.db, &user.id, state.config.auth.reset_ttl_secs).await?;
        let link = format!("{}{}", state.config.auth.reset_link_base, raw);
        if let Err(e) = state.mailer.send_password_reset(&user.email, &link).await {
            tracing::error!("Failed to send reset email to {}: {}", user.email, e);
        }
    }

    Ok(Json(OkResponse { ok: true }))
}

/// Complete a password reset with a token from the reset email. Tokens are
/// single-use; the consumed flag flips in the same statement that checks it.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    validate_password(&request.password).map_err(ApiError::validation)?;

    let now = chrono::Utc::now().to_rfc3339();
    let entry: Option<PasswordResetToken> = sqlx::query_as(
        "SELECT * FROM password_reset_tokens WHERE token_hash = ? AND consumed = 0 AND expires_at > ?",
    )
    .bind(hash_token(&request.token))
    .bind(&now)
    .fetch_optional(&state.db)
    .await?;

    let entry =
        entry.ok_or_else(|| ApiError::validation("Invalid or expired reset token"))?;

    let claimed = sqlx::query(
        "UPDATE password_reset_tokens SET consumed = 1 WHERE id = ? AND consumed = 0",
    )
    .bind(&entry.id)
    .execute(&state.db)
    .await?;
    if claimed.rows_affected() == 0 {
        return Err(ApiError::validation("Invalid or expired reset token"));
    }

    let password_hash = hash_password(&request.password)?;
    let updated = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&entry.user_id)
        .execute(&state.db)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(Json(OkResponse { ok: true }))
}

/// Exchange a refresh token for a fresh access/refresh pair. Claims are
/// re-read from the user row so role changes take effect on rotation.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let claims = state.tokens.verify_refresh(&request.refresh_token)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&claims.sub)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(ApiError::invalid_token)?;

    let access_token = state.tokens.issue_access(&user)?;
    let refresh_token = state.tokens.issue_refresh(&user)?;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user: UserResponse::from(user),
    }))
}

/// Ensure the bootstrap admin account exists. Called once at startup.
pub async fn ensure_admin_user(
    pool: &DbPool,
    email: &str,
    password: Option<&str>,
) -> anyhow::Result<()> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Ok(());
    }

    let generated;
    let password = match password {
        Some(p) => p,
        None => {
            generated = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                "No admin_password configured; generated admin credential for {}: {}",
                email,
                generated
            );
            &generated
        }
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("hashing admin password: {}", e))?;

    sqlx::query(
        "INSERT INTO users (id, name, email, phone, role, password_hash, active, created_at, updated_at) \
         VALUES (?, 'Administrator', ?, NULL, 'ADMIN', ?, 1, ?, ?)",
    )
    .bind(&id)
    .bind(email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Created bootstrap admin user {}", email);
    Ok(())
}
