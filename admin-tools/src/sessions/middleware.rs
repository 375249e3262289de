//! Session middleware.
//!
//! Loads the session named by the cookie, resolves the logged-in user, and
//! after the handler has run, persists whatever the handler changed.

use crate::accounts::users::User;
use crate::sessions::store::SessionStore;
use crate::sessions::{Session, SessionCommit, SessionMap};
use crate::state::AppState;
use crate::web::CurrentUser;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Attach a [`Session`] and the [`CurrentUser`] to every request.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string());

    let (key, data) = match presented.as_deref() {
        Some(key) => load_session(&state, key).await,
        None => (None, SessionMap::new()),
    };
    let session = Session::new(key, data);
    let user = resolve_user(&state, &session).await;

    request.extensions_mut().insert(session.clone());
    request.extensions_mut().insert(CurrentUser(user));

    let mut response = next.run(request).await;

    let commit = session.commit().await;
    if let Some(cookie) = persist(&state, commit, presented.is_some()).await {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Invalid session cookie header: {}", e),
        }
    }

    response
}

/// Load and decode a stored session. Unknown, expired or undecodable
/// sessions start over empty, without a key.
async fn load_session(state: &AppState, key: &str) -> (Option<String>, SessionMap) {
    match state.sessions.load(key).await {
        Ok(Some(record)) => match state.codec.decode(&record.session_data) {
            Ok(data) => (Some(record.session_key), data),
            Err(e) => {
                debug!("Discarding undecodable session: {}", e);
                (None, SessionMap::new())
            }
        },
        Ok(None) => (None, SessionMap::new()),
        Err(e) => {
            error!("Failed to load session: {}", e);
            (None, SessionMap::new())
        }
    }
}

/// Resolve the session's user.
///
/// The user must still exist, be active, and have the password hash the
/// session was issued for; otherwise the session is flushed.
async fn resolve_user(state: &AppState, session: &Session) -> Option<User> {
    let user_id = session.user_id().await?;

    let user = match state.users.get_user(user_id).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to load session user {}: {}", user_id, e);
            return None;
        }
    };

    let valid = match (&user, session.auth_hash().await) {
        (Some(user), Some(claimed)) => {
            user.is_active && state.codec.verify_user_hash(&user.password_hash, &claimed)
        }
        _ => false,
    };

    if valid {
        user
    } else {
        debug!(user_id, "Session no longer valid for user, flushing");
        session.flush().await;
        None
    }
}

/// Write the session back. Returns the `Set-Cookie` value to send, if any.
async fn persist(state: &AppState, commit: SessionCommit, had_cookie: bool) -> Option<String> {
    for stale in &commit.stale_keys {
        if let Err(e) = state.sessions.delete(stale).await {
            warn!("Failed to delete retired session: {}", e);
        }
    }

    let settings = &state.config.session;

    if commit.data.is_empty() {
        if let Some(key) = &commit.key
            && let Err(e) = state.sessions.delete(key).await
        {
            warn!("Failed to delete empty session: {}", e);
        }
        return (had_cookie || commit.modified).then(|| expired_cookie(&settings.cookie_name));
    }

    if !commit.modified && commit.key.is_some() {
        return None;
    }

    let key = commit.key.unwrap_or_else(SessionStore::generate_key);
    let encoded = match state.codec.encode(&commit.data) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("Failed to encode session: {}", e);
            return None;
        }
    };
    let Some(expire_date) = i64::try_from(settings.max_age_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|max_age| Utc::now().checked_add_signed(max_age))
    else {
        error!("Session max age out of range: {}", settings.max_age_secs);
        return None;
    };

    if let Err(e) = state.sessions.save(&key, &encoded, expire_date).await {
        error!("Failed to save session: {}", e);
        return None;
    }

    let mut cookie = format!(
        "{}={key}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name, settings.max_age_secs
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    Some(cookie)
}

fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
