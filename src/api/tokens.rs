//! Token service: stateless signed access/refresh tokens and single-use
//! password reset tokens.
//!
//! Access and refresh tokens are HS256 JWTs signed with distinct secrets and
//! independently configurable lifetimes. Verification checks signature and
//! expiry only; there is no revocation list, so a token dies when it expires.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;
use crate::db::User;

use super::error::ApiError;

/// Identity claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: String,
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.clone(),
            role: user.role.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Signs and verifies the access/refresh token pair.
#[derive(Clone)]
pub struct Tokens {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl Tokens {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    pub fn issue_access(&self, user: &User) -> Result<String, ApiError> {
        sign(Claims::for_user(user, self.access_ttl_secs), &self.access_secret)
    }

    pub fn issue_refresh(&self, user: &User) -> Result<String, ApiError> {
        sign(Claims::for_user(user, self.refresh_ttl_secs), &self.refresh_secret)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, ApiError> {
        verify(token, &self.access_secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, ApiError> {
        verify(token, &self.refresh_secret)
    }
}

fn sign(claims: Claims, secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        ApiError::internal("Failed to issue token")
    })
}

fn verify(token: &str, secret: &str) -> Result<Claims, ApiError> {
    // Signature and expiry only; no issuer/audience claims are set
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation.validate_aud = false;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::invalid_token())
}

/// Generate a random password reset token (raw form, mailed to the user)
pub fn generate_reset_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a reset token for storage; only the hash ever touches the database
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
