//! Password gate.
//!
//! A logged-in user with the pending-reset flag set is sent to the password
//! change page from everywhere except the exempt paths below.

use crate::accounts::users::User;
use crate::web::{CurrentUser, PASSWORD_CHANGE_URL, found};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

/// Path prefixes reachable while a password change is pending.
pub const EXEMPT_PREFIXES: &[&str] = &[
    PASSWORD_CHANGE_URL,
    "/login/",
    "/logout/",
    "/admin/",
    "/static/",
    "/media/",
];

/// Whether a request for `path` by `user` must be sent to the password change page.
pub fn must_redirect_to_password_change(user: Option<&User>, path: &str) -> bool {
    match user {
        Some(user) if user.must_change_password => {
            !EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        }
        _ => false,
    }
}

/// Middleware enforcing the pending password change. Must run inside the session layer.
pub async fn force_password_change(request: Request, next: Next) -> Response {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .and_then(|current| current.0.as_ref());

    if must_redirect_to_password_change(user, request.uri().path()) {
        debug!(path = %request.uri().path(), "Password change pending, redirecting");
        return found(PASSWORD_CHANGE_URL);
    }

    next.run(request).await
}
