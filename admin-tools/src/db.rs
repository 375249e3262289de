//! Database management for the admin tools server.
//!
//! Provides a shared database connection pool used by the user store and
//! the session store.
//!
//! The database backend is selected at compile time via feature flags:
//! - `sqlite` (default): Uses SQLite
//! - `postgres`: Uses PostgreSQL

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

// Re-export the pool and row types for the selected backend
#[cfg(feature = "sqlite")]
pub use sqlx::{SqlitePool as DbPool, sqlite::SqliteRow as DbRow};

#[cfg(feature = "postgres")]
pub use sqlx::{PgPool as DbPool, postgres::PgRow as DbRow};

/// Shared database for the server and CLI commands.
///
/// Owns the connection pool and runs migrations on connect. Create it once
/// at startup and hand out pools with [`Database::pool`].
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to SQLite (creating the file if needed) and run migrations.
    #[cfg(feature = "sqlite")]
    pub async fn new(config: &DatabaseConfig, data_dir: &Path) -> Result<Self> {
        let url = match &config.url {
            Some(url) => url.clone(),
            None => {
                std::fs::create_dir_all(data_dir).with_context(|| {
                    format!("Failed to create data directory: {}", data_dir.display())
                })?;
                format!("sqlite:{}", data_dir.join("admin-tools.db").display())
            }
        };

        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid SQLite URL: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        info!(backend = "sqlite", url = %url, "Database connected");

        Ok(Self { pool })
    }

    /// Connect to PostgreSQL and run migrations.
    #[cfg(feature = "postgres")]
    pub async fn new(config: &DatabaseConfig, _data_dir: &Path) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("database.url (or DATABASE_URL) is required for the postgres backend")?;

        let options = PgConnectOptions::from_str(url).context("Invalid PostgreSQL URL")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        sqlx::migrate!("./migrations/postgres")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        info!(backend = "postgres", "Database connected");

        Ok(Self { pool })
    }

    /// Get a clone of the connection pool (cheap, Arc-based internally).
    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }
}

/// Format a timestamp for storage.
///
/// Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`) so
/// that string comparison in SQL orders them correctly on every backend.
pub fn to_db_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`to_db_timestamp`].
pub fn from_db_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {s}"))?
        .with_timezone(&Utc))
}
