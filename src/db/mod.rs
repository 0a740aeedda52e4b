mod models;

pub use models::*;

use anyhow::{bail, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = SqlitePool;

/// Embedded, versioned migrations from ./migrations. Applied by the
/// `guardpost migrate` subcommand, never as a side effect of `serve`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

pub async fn init(data_dir: &Path, config: &DatabaseConfig) -> Result<DbPool> {
    let db_path = data_dir.join("guardpost.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Opening database at {}", db_path.display());

    open(
        &db_url,
        config.max_connections,
        Duration::from_secs(config.acquire_timeout_secs),
    )
    .await
}

pub async fn open(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await?;

    // WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    Ok(pool)
}

/// Apply all pending migrations.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    info!("Running database migrations...");
    MIGRATOR.run(pool).await?;
    info!("Migrations completed");
    Ok(())
}

/// Refuse to serve against a database the operator has not migrated.
pub async fn ensure_migrated(pool: &DbPool) -> Result<()> {
    let applied: i64 =
        match sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
        {
            Ok(n) => n,
            Err(_) => 0,
        };

    let expected = MIGRATOR.migrations.len() as i64;
    if applied < expected {
        bail!(
            "database schema is behind ({applied}/{expected} migrations applied); \
             run `guardpost migrate` first"
        );
    }
    Ok(())
}

/// In-memory database with migrations applied, for tests.
#[cfg(test)]
pub async fn open_test_pool() -> DbPool {
    let pool = open("sqlite::memory:", 1, Duration::from_secs(5))
        .await
        .expect("in-memory pool");
    migrate(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let pool = open_test_pool().await;
        ensure_migrated(&pool).await.expect("schema up to date");

        // Spot-check a couple of tables from each migration
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_ensure_migrated_rejects_fresh_db() {
        let pool = open("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ensure_migrated(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_site_delete_cascades() {
        let pool = open_test_pool().await;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO sites (id, name, strength, rate_per_guard, created_at, updated_at) \
             VALUES ('s1', 'Alpha Tower', 4, 120.0, ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO attendance (id, site_id, guard_id, date, status, created_at, updated_at) \
             VALUES ('a1', 's1', NULL, '2025-01-05', 'PRESENT', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO bills (id, code, site_id, amount, due_date, status, created_at, updated_at) \
             VALUES ('b1', 'BILL-00000001', 's1', 500.0, '2025-02-01', 'OUTSTANDING', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM sites WHERE id = 's1'")
            .execute(&pool)
            .await
            .unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }
}
