//! Admin access control.

use crate::accounts::users::User;
use crate::admin::templates::ForbiddenTemplate;
use crate::sessions::Session;
use crate::templates::BaseContext;
use crate::web::{AuthUser, render_with_status};
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// A logged-in user allowed on the admin site (staff or superuser).
///
/// Anonymous requests are redirected to login; other users get 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.can_access_admin() {
            return Ok(StaffUser(user));
        }

        warn!(user = %user.username, path = %parts.uri.path(), "Admin access denied");
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let template = ForbiddenTemplate {
            base: BaseContext::new(&session, Some(&user)).await,
            reason: "You don't have permission to access the admin site.",
        };
        Err(render_with_status(StatusCode::FORBIDDEN, &template))
    }
}
