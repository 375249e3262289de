//! Session records in the database.

use crate::db::{DbPool, DbRow, from_db_timestamp, to_db_timestamp};
use crate::sql;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::Row;
use tracing::warn;

/// Length of generated session keys.
pub const SESSION_KEY_LENGTH: usize = 40;

/// Stored session: key, encoded payload and expiry.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_key: String,
    pub session_data: String,
    pub expire_date: DateTime<Utc>,
}

/// Database-backed session storage.
pub struct SessionStore {
    pool: DbPool,
}

impl SessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Generate a cryptographically secure session key.
    pub fn generate_key() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_KEY_LENGTH)
            .map(char::from)
            .collect::<String>()
            .to_ascii_lowercase()
    }

    /// Load a session that has not expired yet.
    pub async fn load(&self, session_key: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(sql::SELECT_SESSION)
            .bind(session_key)
            .bind(to_db_timestamp(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query session")?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Insert or replace a session.
    pub async fn save(
        &self,
        session_key: &str,
        session_data: &str,
        expire_date: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(sql::UPSERT_SESSION)
            .bind(session_key)
            .bind(session_data)
            .bind(to_db_timestamp(expire_date))
            .execute(&self.pool)
            .await
            .context("Failed to save session")?;
        Ok(())
    }

    /// Delete a session (logout, key rotation).
    pub async fn delete(&self, session_key: &str) -> Result<()> {
        sqlx::query(sql::DELETE_SESSION)
            .bind(session_key)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// All sessions whose expiry is now or later, in no particular order.
    pub async fn active_sessions(&self) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query(sql::SELECT_ACTIVE_SESSIONS)
            .bind(to_db_timestamp(Utc::now()))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sessions")?;

        Ok(rows
            .iter()
            .filter_map(|row| match record_from_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable session row: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Delete all expired sessions. Returns the number removed.
    pub async fn clear_expired(&self) -> Result<u64> {
        let result = sqlx::query(sql::DELETE_EXPIRED_SESSIONS)
            .bind(to_db_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .context("Failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &DbRow) -> Result<SessionRecord> {
    let expire_date: String = row.try_get("expire_date")?;
    Ok(SessionRecord {
        session_key: row.try_get("session_key")?,
        session_data: row.try_get("session_data")?,
        expire_date: from_db_timestamp(&expire_date)?,
    })
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::Database;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SessionStore) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&DatabaseConfig::default(), temp.path())
            .await
            .unwrap();
        (temp, SessionStore::new(db.pool()))
    }

    #[test]
    fn test_generate_key() {
        let key = SessionStore::generate_key();
        assert_eq!(key.len(), SESSION_KEY_LENGTH);
        assert!(key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(key, SessionStore::generate_key());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (_temp, store) = store().await;
        let expires = Utc::now() + Duration::hours(1);

        store.save("k1", "payload-1", expires).await.unwrap();
        let loaded = store.load("k1").await.unwrap().unwrap();
        assert_eq!(loaded.session_data, "payload-1");

        store.save("k1", "payload-2", expires).await.unwrap();
        assert_eq!(store.load("k1").await.unwrap().unwrap().session_data, "payload-2");

        store.delete("k1").await.unwrap();
        assert!(store.load("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_hidden_and_cleared() {
        let (_temp, store) = store().await;
        store
            .save("old", "x", Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        store
            .save("new", "y", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.load("old").await.unwrap().is_none());

        let active = store.active_sessions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_key, "new");

        assert_eq!(store.clear_expired().await.unwrap(), 1);
        assert_eq!(store.clear_expired().await.unwrap(), 0);
    }
}
