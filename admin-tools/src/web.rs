//! Request extractors and response helpers shared by the route modules.

use crate::accounts::users::User;
use askama::Template;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::convert::Infallible;
use tracing::error;

/// Login page, target of every login-required redirect.
pub const LOGIN_URL: &str = "/login/";
/// Landing page after login and after a permission denial.
pub const DASHBOARD_URL: &str = "/dashboard/";
/// Password change page, target of the password gate.
pub const PASSWORD_CHANGE_URL: &str = "/password-change/";

/// `302 Found` redirect.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Redirect to the login page, remembering where the user was going.
pub fn login_redirect(next: &str) -> Response {
    found(&format!("{LOGIN_URL}?next={}", urlencoding::encode(next)))
}

/// Whether `next` is safe to redirect to after login.
///
/// Only local absolute paths are accepted; `//host` and `/\host` are rejected.
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(char::is_control)
}

/// Render a template, answering 500 if rendering fails.
pub fn render<T: Template>(template: &T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template error: {}", e);
            internal_error()
        }
    }
}

/// Plain 500 response for store failures.
pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// The user attached to the request's session, if any.
///
/// Inserted by the session middleware after the user has been re-checked
/// against the database.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Login-required extractor.
///
/// Anonymous requests are redirected to the login page with `next` set to the
/// requested path.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(CurrentUser(Some(user))) = parts.extensions.get::<CurrentUser>() {
            return Ok(AuthUser(user.clone()));
        }

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| &original.0)
            .unwrap_or(&parts.uri);
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        Err(login_redirect(next))
    }
}
