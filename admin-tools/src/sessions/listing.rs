//! Active session listing for the session viewer.

use crate::accounts::users::{User, UserStore};
use crate::sessions::codec::SessionCodec;
use crate::sessions::store::SessionStore;
use crate::sessions::user_id_from;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Number of key characters shown before truncation.
pub const KEY_DISPLAY_LENGTH: usize = 20;

/// User attached to a listed session.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

/// One row of the session listing.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_key: String,
    pub full_session_key: String,
    pub user: Option<SessionUser>,
    pub expire_date: DateTime<Utc>,
    pub is_current: bool,
    pub data_keys: Vec<String>,
}

/// Shorten a session key for display.
pub fn truncate_key(key: &str) -> String {
    if key.chars().count() > KEY_DISPLAY_LENGTH {
        let head: String = key.chars().take(KEY_DISPLAY_LENGTH).collect();
        format!("{head}...")
    } else {
        key.to_string()
    }
}

/// List non-expired sessions, latest expiry first.
///
/// Records whose payload does not decode are skipped. Users are looked up once
/// per id; a user that no longer exists shows as anonymous.
pub async fn list_active_sessions(
    sessions: &SessionStore,
    users: &UserStore,
    codec: &SessionCodec,
    current_key: Option<&str>,
) -> Result<Vec<SessionSummary>> {
    let records = sessions.active_sessions().await?;
    let mut user_cache: HashMap<i64, Option<SessionUser>> = HashMap::new();
    let mut summaries = Vec::with_capacity(records.len());

    for record in records {
        let data = match codec.decode(&record.session_data) {
            Ok(data) => data,
            Err(e) => {
                debug!(
                    session = %truncate_key(&record.session_key),
                    "Skipping undecodable session: {}", e
                );
                continue;
            }
        };

        let user = match user_id_from(&data) {
            Some(id) => {
                if !user_cache.contains_key(&id) {
                    let resolved = match users.get_user(id).await {
                        Ok(user) => user.as_ref().map(session_user),
                        Err(e) => {
                            warn!("Failed to look up user {}: {}", id, e);
                            None
                        }
                    };
                    user_cache.insert(id, resolved);
                }
                user_cache.get(&id).cloned().flatten()
            }
            None => None,
        };

        summaries.push(SessionSummary {
            session_key: truncate_key(&record.session_key),
            is_current: current_key == Some(record.session_key.as_str()),
            full_session_key: record.session_key,
            user,
            expire_date: record.expire_date,
            data_keys: data.keys().cloned().collect(),
        });
    }

    summaries.sort_by(|a, b| b.expire_date.cmp(&a.expire_date));
    Ok(summaries)
}

fn session_user(user: &User) -> SessionUser {
    SessionUser {
        id: user.id,
        username: user.username.clone(),
        display_name: user.display_name(),
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::accounts::users::NewUser;
    use crate::config::DatabaseConfig;
    use crate::db::Database;
    use crate::sessions::{AUTH_USER_ID_KEY, SessionMap};
    use chrono::Duration;
    use serde_json::Value;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_key() {
        assert_eq!(truncate_key("short"), "short");
        assert_eq!(truncate_key("a".repeat(20).as_str()), "a".repeat(20));
        assert_eq!(
            truncate_key("abcdefghijklmnopqrstuvwxyz"),
            "abcdefghijklmnopqrst..."
        );
    }

    #[tokio::test]
    async fn test_listing() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&DatabaseConfig::default(), temp.path())
            .await
            .unwrap();
        let users = UserStore::new(db.pool());
        let sessions = SessionStore::new(db.pool());
        let codec = SessionCodec::new("test-secret").unwrap();

        let mut new = NewUser::new("alice", "Tangerine-Orbit-42");
        new.first_name = "Alice";
        new.last_name = "Liddell";
        let alice = users.create_user(&new).await.unwrap();

        let mut authed = SessionMap::new();
        authed.insert(AUTH_USER_ID_KEY.into(), Value::String(alice.id.to_string()));
        let mut ghost = SessionMap::new();
        ghost.insert(AUTH_USER_ID_KEY.into(), Value::String("9999".into()));
        let mut anon = SessionMap::new();
        anon.insert("theme".into(), Value::from("dark"));

        let now = Utc::now();
        let alice_key = "a".repeat(40);
        sessions
            .save(&alice_key, &codec.encode(&authed).unwrap(), now + Duration::hours(3))
            .await
            .unwrap();
        sessions
            .save("ghost", &codec.encode(&ghost).unwrap(), now + Duration::hours(1))
            .await
            .unwrap();
        sessions
            .save("anon", &codec.encode(&anon).unwrap(), now + Duration::hours(2))
            .await
            .unwrap();
        sessions
            .save("garbage", "not-a-payload", now + Duration::hours(4))
            .await
            .unwrap();
        sessions
            .save("expired", &codec.encode(&authed).unwrap(), now - Duration::hours(1))
            .await
            .unwrap();

        let listed = list_active_sessions(&sessions, &users, &codec, Some("anon"))
            .await
            .unwrap();

        let keys: Vec<&str> = listed.iter().map(|s| s.full_session_key.as_str()).collect();
        assert_eq!(keys, vec![alice_key.as_str(), "anon", "ghost"]);

        assert_eq!(listed[0].session_key, format!("{}...", "a".repeat(20)));
        let user = listed[0].user.as_ref().unwrap();
        assert_eq!(user.display_name, "Alice Liddell");
        assert!(!listed[0].is_current);

        assert!(listed[1].user.is_none());
        assert!(listed[1].is_current);
        assert_eq!(listed[1].data_keys, vec!["theme".to_string()]);

        assert!(listed[2].user.is_none());
    }
}
