//! Server-side sessions.
//!
//! Provides:
//! - Signed payload encoding ([`codec`])
//! - Database storage of session records ([`store`])
//! - The per-request [`Session`] handle and flash messages
//! - The middleware that loads and commits sessions ([`middleware`])
//! - Listing of active sessions for the session viewer ([`listing`])

pub mod codec;
pub mod listing;
pub mod middleware;
pub mod store;

pub use codec::{SessionCodec, SessionError, SessionMap};
pub use listing::{SessionSummary, list_active_sessions};
pub use middleware::session_layer;
pub use store::{SessionRecord, SessionStore};

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Payload key holding the logged-in user's id (as a string).
pub const AUTH_USER_ID_KEY: &str = "_auth_user_id";
/// Payload key holding the digest of the user's password hash.
pub const AUTH_USER_HASH_KEY: &str = "_auth_user_hash";
/// Payload key holding queued flash messages.
pub const MESSAGES_KEY: &str = "_messages";

/// Extract the user id from a decoded payload.
///
/// Accepts the id stored as a string or as a number.
pub fn user_id_from(data: &SessionMap) -> Option<i64> {
    match data.get(AUTH_USER_ID_KEY)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl FlashMessage {
    /// Bootstrap alert class for this message.
    pub fn css_class(&self) -> &'static str {
        match self.level {
            MessageLevel::Info => "info",
            MessageLevel::Success => "success",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "danger",
        }
    }
}

/// Session state as loaded for one request.
#[derive(Debug, Default)]
struct SessionState {
    key: Option<String>,
    data: SessionMap,
    modified: bool,
    /// Keys retired by a flush or key rotation, deleted on commit
    stale_keys: Vec<String>,
}

/// What the middleware must persist once the handler is done.
#[derive(Debug)]
pub struct SessionCommit {
    pub key: Option<String>,
    pub data: SessionMap,
    pub modified: bool,
    pub stale_keys: Vec<String>,
}

/// Per-request handle to the current session.
///
/// Cloned into request extensions by [`session_layer`]; handlers extract it
/// and mutate it, and the middleware writes the result back afterwards.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(key: Option<String>, data: SessionMap) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                key,
                data,
                ..SessionState::default()
            })),
        }
    }

    /// Current session key, if the session has been stored.
    pub async fn key(&self) -> Option<String> {
        self.inner.lock().await.key.clone()
    }

    /// Id of the logged-in user, if any.
    pub async fn user_id(&self) -> Option<i64> {
        user_id_from(&self.inner.lock().await.data)
    }

    /// Stored password-hash digest of the logged-in user, if any.
    pub async fn auth_hash(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .data
            .get(AUTH_USER_HASH_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.data.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        let mut state = self.inner.lock().await;
        state.data.insert(key.into(), value);
        state.modified = true;
    }

    /// Issue a new key for the same data (prevents session fixation).
    pub async fn cycle_key(&self) {
        let mut state = self.inner.lock().await;
        Self::retire_key(&mut state);
    }

    /// Drop all data and retire the key.
    pub async fn flush(&self) {
        let mut state = self.inner.lock().await;
        state.data.clear();
        Self::retire_key(&mut state);
    }

    fn retire_key(state: &mut SessionState) {
        if let Some(old) = state.key.take() {
            state.stale_keys.push(old);
        }
        state.modified = true;
    }

    /// Attach a user to the session.
    ///
    /// Data from a different user's session is discarded; the key is rotated either way.
    pub async fn login(&self, user_id: i64, user_hash: String) {
        let mut state = self.inner.lock().await;
        match user_id_from(&state.data) {
            Some(existing) if existing != user_id => state.data.clear(),
            _ => {}
        }
        Self::retire_key(&mut state);
        state
            .data
            .insert(AUTH_USER_ID_KEY.to_string(), Value::String(user_id.to_string()));
        state
            .data
            .insert(AUTH_USER_HASH_KEY.to_string(), Value::String(user_hash));
    }

    /// Replace the stored password digest after a password change and rotate the key.
    pub async fn update_auth_hash(&self, user_hash: String) {
        let mut state = self.inner.lock().await;
        state
            .data
            .insert(AUTH_USER_HASH_KEY.to_string(), Value::String(user_hash));
        Self::retire_key(&mut state);
    }

    /// Remove authentication keys, keeping other data.
    pub async fn clear_auth(&self) {
        let mut state = self.inner.lock().await;
        let had_id = state.data.remove(AUTH_USER_ID_KEY).is_some();
        let had_hash = state.data.remove(AUTH_USER_HASH_KEY).is_some();
        if had_id || had_hash {
            state.modified = true;
        }
    }

    /// Queue a flash message.
    pub async fn add_message(&self, level: MessageLevel, text: impl Into<String>) {
        let mut state = self.inner.lock().await;
        let mut messages = Self::messages_in(&state.data);
        messages.push(FlashMessage {
            level,
            text: text.into(),
        });
        if let Ok(value) = serde_json::to_value(messages) {
            state.data.insert(MESSAGES_KEY.to_string(), value);
            state.modified = true;
        }
    }

    /// Take (and clear) queued flash messages.
    pub async fn take_messages(&self) -> Vec<FlashMessage> {
        let mut state = self.inner.lock().await;
        let messages = Self::messages_in(&state.data);
        if state.data.remove(MESSAGES_KEY).is_some() {
            state.modified = true;
        }
        messages
    }

    fn messages_in(data: &SessionMap) -> Vec<FlashMessage> {
        data.get(MESSAGES_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Snapshot what needs persisting.
    pub async fn commit(&self) -> SessionCommit {
        let mut state = self.inner.lock().await;
        SessionCommit {
            key: state.key.clone(),
            data: state.data.clone(),
            modified: state.modified,
            stale_keys: std::mem::take(&mut state.stale_keys),
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session layer not installed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_rotates_key_and_stores_user() {
        let session = Session::new(Some("old-key".into()), SessionMap::new());
        session.login(42, "digest".into()).await;

        assert_eq!(session.user_id().await, Some(42));
        assert_eq!(session.auth_hash().await.as_deref(), Some("digest"));
        assert_eq!(session.key().await, None);

        let commit = session.commit().await;
        assert!(commit.modified);
        assert_eq!(commit.stale_keys, vec!["old-key".to_string()]);
    }

    #[tokio::test]
    async fn test_login_as_other_user_discards_data() {
        let session = Session::new(None, SessionMap::new());
        session.login(1, "a".into()).await;
        session.insert("cart", Value::from(3)).await;

        session.login(1, "a".into()).await;
        assert!(session.get("cart").await.is_some());

        session.login(2, "b".into()).await;
        assert!(session.get("cart").await.is_none());
        assert_eq!(session.user_id().await, Some(2));
    }

    #[tokio::test]
    async fn test_flush_clears_everything() {
        let session = Session::new(Some("k".into()), SessionMap::new());
        session.login(5, "h".into()).await;
        session.flush().await;

        assert_eq!(session.user_id().await, None);
        let commit = session.commit().await;
        assert!(commit.data.is_empty());
        assert!(commit.key.is_none());
    }

    #[tokio::test]
    async fn test_flash_messages_are_one_shot() {
        let session = Session::new(None, SessionMap::new());
        assert!(session.take_messages().await.is_empty());
        assert!(!session.commit().await.modified);

        session.add_message(MessageLevel::Success, "Saved").await;
        session.add_message(MessageLevel::Error, "Oops").await;

        let messages = session.take_messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Saved");
        assert_eq!(messages[1].css_class(), "danger");
        assert!(session.take_messages().await.is_empty());
    }

    #[test]
    fn test_user_id_from_accepts_string_or_number() {
        let mut data = SessionMap::new();
        assert_eq!(user_id_from(&data), None);

        data.insert(AUTH_USER_ID_KEY.into(), Value::from("12"));
        assert_eq!(user_id_from(&data), Some(12));

        data.insert(AUTH_USER_ID_KEY.into(), Value::from(13));
        assert_eq!(user_id_from(&data), Some(13));

        data.insert(AUTH_USER_ID_KEY.into(), Value::from("abc"));
        assert_eq!(user_id_from(&data), None);
    }
}
