//! Login, logout and password change handlers.

use crate::accounts::password::validate_password;
use crate::accounts::users::UserStore;
use crate::sessions::{MessageLevel, Session};
use crate::state::AppState;
use crate::templates::{BaseContext, LoginTemplate, PasswordChangeTemplate};
use crate::web::{
    AuthUser, CurrentUser, DASHBOARD_URL, LOGIN_URL, PASSWORD_CHANGE_URL, found, internal_error,
    is_safe_next, render,
};
use axum::{
    Form, Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Build the accounts router.
pub fn accounts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/login/", get(login_page).post(login_submit))
        .route("/logout/", get(logout).post(logout))
        .route(
            PASSWORD_CHANGE_URL,
            get(password_change_page).post(password_change_submit),
        )
}

async fn index() -> Response {
    found(LOGIN_URL)
}

/// Where to go after login.
fn redirect_target(next: Option<&str>) -> &str {
    match next {
        Some(next) if is_safe_next(next) => next,
        _ => DASHBOARD_URL,
    }
}

#[derive(Deserialize)]
pub struct LoginQuery {
    next: Option<String>,
}

/// Login page handler.
async fn login_page(
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LoginQuery>,
) -> Response {
    // Already logged in
    if user.is_some() {
        return found(redirect_target(query.next.as_deref()));
    }

    let template = LoginTemplate {
        base: BaseContext::new(&session, None).await,
        error: None,
        username: String::new(),
        next: query.next.unwrap_or_default(),
    };
    render(&template)
}

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
    #[serde(default)]
    next: Option<String>,
}

/// Login form submission handler.
async fn login_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match state
        .users
        .authenticate(form.username.trim(), &form.password)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(username = %form.username, "Failed login attempt");
            return login_error(&session, form, INVALID_LOGIN).await;
        }
        Err(e) => {
            error!("Login error: {}", e);
            return login_error(&session, form, "An error occurred. Please try again.").await;
        }
    };

    session
        .login(user.id, state.codec.user_hash(&user.password_hash))
        .await;
    if let Err(e) = state.users.record_login(user.id).await {
        warn!("Failed to record login time: {}", e);
    }
    info!(user = %user.username, "User logged in");

    found(redirect_target(form.next.as_deref()))
}

async fn login_error(session: &Session, form: LoginForm, message: &str) -> Response {
    let template = LoginTemplate {
        base: BaseContext::new(session, None).await,
        error: Some(message.to_string()),
        username: form.username,
        next: form.next.unwrap_or_default(),
    };
    render(&template)
}

/// Logout handler. Accepts GET and POST.
async fn logout(session: Session, CurrentUser(user): CurrentUser) -> Response {
    if let Some(user) = user {
        session.flush().await;
        session
            .add_message(
                MessageLevel::Success,
                format!(
                    "You have been successfully logged out. Goodbye, {}!",
                    user.username
                ),
            )
            .await;
        info!(user = %user.username, "User logged out");
    }
    found(LOGIN_URL)
}

/// Password change page handler.
async fn password_change_page(session: Session, AuthUser(user): AuthUser) -> Response {
    let template = PasswordChangeTemplate {
        must_change: user.must_change_password,
        base: BaseContext::new(&session, Some(&user)).await,
        errors: Vec::new(),
    };
    render(&template)
}

/// Password change form data.
#[derive(Deserialize)]
pub struct PasswordChangeForm {
    old_password: String,
    new_password1: String,
    new_password2: String,
}

/// Password change submission handler.
///
/// On success the pending-reset flag is cleared and the session is re-keyed
/// with the new password digest, which signs out the user's other sessions.
async fn password_change_submit(
    State(state): State<Arc<AppState>>,
    session: Session,
    AuthUser(user): AuthUser,
    Form(form): Form<PasswordChangeForm>,
) -> Response {
    let errors = if !UserStore::verify_password(&form.old_password, &user.password_hash) {
        vec!["Your old password was entered incorrectly. Please enter it again.".to_string()]
    } else if form.new_password1 != form.new_password2 {
        vec!["The two password fields didn't match.".to_string()]
    } else {
        validate_password(&form.new_password1, &user.username, &user.email)
    };

    if !errors.is_empty() {
        let template = PasswordChangeTemplate {
            must_change: user.must_change_password,
            base: BaseContext::new(&session, Some(&user)).await,
            errors,
        };
        return render(&template);
    }

    let updated = match state
        .users
        .set_password(user.id, &form.new_password1, false)
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            error!("Failed to change password: {}", e);
            return internal_error();
        }
    };

    session
        .update_auth_hash(state.codec.user_hash(&updated.password_hash))
        .await;
    session
        .add_message(
            MessageLevel::Success,
            "Your password has been changed successfully!",
        )
        .await;
    info!(user = %updated.username, "Password changed");

    found(DASHBOARD_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_target() {
        assert_eq!(redirect_target(None), "/dashboard/");
        assert_eq!(redirect_target(Some("/tools/sessions/")), "/tools/sessions/");
        assert_eq!(redirect_target(Some("https://evil.example/")), "/dashboard/");
        assert_eq!(redirect_target(Some("")), "/dashboard/");
    }
}
