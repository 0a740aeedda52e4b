use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign access tokens.
    #[serde(default = "default_secret")]
    pub access_secret: String,
    /// Secret used to sign refresh tokens. Must differ from access_secret.
    #[serde(default = "default_secret")]
    pub refresh_secret: String,
    /// Access token lifetime in seconds. The 30-day default matches the
    /// mobile client's re-login cadence; shorten it for hardened deployments.
    #[serde(default = "default_token_ttl")]
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub refresh_ttl_secs: i64,
    /// Password reset token lifetime in seconds.
    #[serde(default = "default_reset_ttl")]
    pub reset_ttl_secs: i64,
    /// Bootstrap admin account, created at startup when missing.
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Base link embedded in password reset emails; the raw token is appended.
    #[serde(default = "default_reset_link_base")]
    pub reset_link_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: default_secret(),
            refresh_secret: default_secret(),
            access_ttl_secs: default_token_ttl(),
            refresh_ttl_secs: default_token_ttl(),
            reset_ttl_secs: default_reset_ttl(),
            admin_email: default_admin_email(),
            admin_password: None,
            reset_link_base: default_reset_link_base(),
        }
    }
}

fn default_secret() -> String {
    // Generate a random secret if not provided. Tokens then die with the
    // process, so production deployments must set both secrets explicitly.
    uuid::Uuid::new_v4().to_string()
}

fn default_token_ttl() -> i64 {
    60 * 60 * 24 * 30
}

fn default_reset_ttl() -> i64 {
    60 * 30
}

fn default_admin_email() -> String {
    "admin@guardpost.local".to_string()
}

fn default_reset_link_base() -> String {
    "guardpost://reset-password?token=".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Rows returned by list endpoints when the caller sends no limit.
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,
    /// Upper bound applied to any caller-supplied limit.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_page_limit() -> u32 {
    500
}

fn default_max_limit() -> u32 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before failing the request.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SMTP settings for outbound mail (password reset links). Mail is skipped
/// with a warning when smtp_host or from_address is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Guardpost".to_string()
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            pagination: PaginationConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            email: EmailConfig::default(),
        }
    }
}
