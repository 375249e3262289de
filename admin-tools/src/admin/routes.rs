//! Admin route handlers.
//!
//! Provides HTTP handlers for the admin site: user list, user creation and
//! user editing (flags, tool groups, password reset).

use crate::accounts::password::validate_password;
use crate::accounts::users::{NewUser, User, UserEdit, UserFlags};
use crate::admin::middleware::StaffUser;
use crate::admin::templates::{
    AdminIndexTemplate, AdminUserTemplate, CreateFormValues, ForbiddenTemplate, GroupMembership,
    GroupSummary,
};
use crate::permissions::Tool;
use crate::sessions::{MessageLevel, Session};
use crate::state::AppState;
use crate::templates::BaseContext;
use crate::web::{found, internal_error, render, render_with_status};
use anyhow::Result;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const SUPERUSER_ONLY: &str = "Only superusers can grant superuser status.";

/// Build the admin router.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/", get(index))
        .route("/admin/users", post(user_create))
        .route("/admin/users/{id}", get(user_detail).post(user_update))
}

/// 403 for a staff user touching an account above their own level.
async fn forbidden(session: &Session, staff: &User) -> Response {
    let template = ForbiddenTemplate {
        base: BaseContext::new(session, Some(staff)).await,
        reason: "Only superusers can change superuser accounts.",
    };
    render_with_status(StatusCode::FORBIDDEN, &template)
}

/// Unchecked checkboxes are absent from the form body.
fn checked(value: &Option<String>) -> bool {
    value.is_some()
}

async fn group_summaries(state: &AppState) -> Result<Vec<GroupSummary>> {
    let mut groups = Vec::with_capacity(Tool::ALL.len());
    for tool in Tool::ALL {
        let members = state.users.group_members(tool.group_name()).await?;
        groups.push(GroupSummary {
            tool_title: tool.title(),
            group_name: tool.group_name(),
            members: members.into_iter().map(|u| u.username).collect(),
        });
    }
    Ok(groups)
}

async fn render_index(
    state: &AppState,
    session: &Session,
    staff: &User,
    form: CreateFormValues,
    errors: Vec<String>,
) -> Response {
    let users = match state.users.list_users().await {
        Ok(users) => users,
        Err(e) => {
            error!("Failed to list users: {}", e);
            return internal_error();
        }
    };
    let groups = match group_summaries(state).await {
        Ok(groups) => groups,
        Err(e) => {
            error!("Failed to list groups: {}", e);
            return internal_error();
        }
    };

    let template = AdminIndexTemplate {
        base: BaseContext::new(session, Some(staff)).await,
        can_grant_superuser: staff.is_superuser,
        users,
        groups,
        form,
        errors,
    };
    render(&template)
}

/// Admin index handler.
async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
    StaffUser(staff): StaffUser,
) -> Response {
    let form = CreateFormValues {
        must_change_password: true,
        ..CreateFormValues::default()
    };
    render_index(&state, &session, &staff, form, Vec::new()).await
}

/// User creation form data.
#[derive(Deserialize)]
pub struct CreateUserForm {
    username: String,
    password: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    is_staff: Option<String>,
    is_superuser: Option<String>,
    must_change_password: Option<String>,
}

/// User creation handler.
async fn user_create(
    State(state): State<Arc<AppState>>,
    session: Session,
    StaffUser(staff): StaffUser,
    Form(form): Form<CreateUserForm>,
) -> Response {
    let username = form.username.trim();
    let email = form.email.trim();

    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push("Username is required.".to_string());
    }
    if form.password.is_empty() {
        errors.push("Password is required.".to_string());
    } else {
        errors.extend(validate_password(&form.password, username, email));
    }
    if checked(&form.is_superuser) && !staff.is_superuser {
        errors.push(SUPERUSER_ONLY.to_string());
    }

    if errors.is_empty() {
        let new_user = NewUser {
            username,
            password: &form.password,
            email,
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            is_staff: checked(&form.is_staff),
            is_superuser: checked(&form.is_superuser),
            must_change_password: checked(&form.must_change_password),
        };
        match state.users.create_user(&new_user).await {
            Ok(user) => {
                info!(user = %user.username, by = %staff.username, "User created from admin site");
                session
                    .add_message(
                        MessageLevel::Success,
                        format!("User \"{}\" was created.", user.username),
                    )
                    .await;
                return found(&format!("/admin/users/{}", user.id));
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    let values = CreateFormValues {
        username: username.to_string(),
        email: email.to_string(),
        first_name: form.first_name,
        last_name: form.last_name,
        is_staff: checked(&form.is_staff),
        is_superuser: checked(&form.is_superuser),
        must_change_password: checked(&form.must_change_password),
    };
    render_index(&state, &session, &staff, values, errors).await
}

async fn render_user(session: &Session, staff: &User, user: User, errors: Vec<String>) -> Response {
    let memberships = Tool::ALL
        .into_iter()
        .map(|tool| GroupMembership {
            field: tool.group_name(),
            tool_title: tool.title(),
            member: user.in_group(tool.group_name()),
        })
        .collect();

    let template = AdminUserTemplate {
        base: BaseContext::new(session, Some(staff)).await,
        can_grant_superuser: staff.is_superuser,
        user,
        memberships,
        errors,
    };
    render(&template)
}

async fn load_user(state: &AppState, id: i64) -> Result<User, Response> {
    match state.users.get_user(id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found").into_response()),
        Err(e) => {
            error!("Failed to load user {}: {}", id, e);
            Err(internal_error())
        }
    }
}

/// User detail handler.
async fn user_detail(
    State(state): State<Arc<AppState>>,
    session: Session,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
) -> Response {
    match load_user(&state, id).await {
        Ok(user) => render_user(&session, &staff, user, Vec::new()).await,
        Err(response) => response,
    }
}

/// User edit form data.
#[derive(Deserialize)]
pub struct UpdateUserForm {
    is_active: Option<String>,
    is_staff: Option<String>,
    is_superuser: Option<String>,
    must_change_password: Option<String>,
    annotation_users: Option<String>,
    session_viewers: Option<String>,
    #[serde(default)]
    new_password: String,
}

impl UpdateUserForm {
    fn wants_group(&self, tool: Tool) -> bool {
        match tool {
            Tool::Annotation => checked(&self.annotation_users),
            Tool::SessionViewer => checked(&self.session_viewers),
        }
    }
}

/// User update handler.
async fn user_update(
    State(state): State<Arc<AppState>>,
    session: Session,
    StaffUser(staff): StaffUser,
    Path(id): Path<i64>,
    Form(form): Form<UpdateUserForm>,
) -> Response {
    let user = match load_user(&state, id).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if !staff.is_superuser {
        if user.is_superuser {
            warn!(user = %user.username, by = %staff.username, "Refused edit of superuser account");
            return forbidden(&session, &staff).await;
        }
        if checked(&form.is_superuser) {
            warn!(user = %user.username, by = %staff.username, "Refused superuser grant");
            return render_user(&session, &staff, user, vec![SUPERUSER_ONLY.to_string()]).await;
        }
    }

    if !form.new_password.is_empty() {
        let errors = validate_password(&form.new_password, &user.username, &user.email);
        if !errors.is_empty() {
            return render_user(&session, &staff, user, errors).await;
        }
    }

    if let Err(e) = apply_update(&state, &user, &form).await {
        error!("Failed to update user {}: {}", id, e);
        return internal_error();
    }

    info!(user = %user.username, by = %staff.username, "User updated from admin site");
    session
        .add_message(
            MessageLevel::Success,
            format!("User \"{}\" was changed successfully.", user.username),
        )
        .await;
    found(&format!("/admin/users/{id}"))
}

async fn apply_update(state: &AppState, user: &User, form: &UpdateUserForm) -> Result<()> {
    let edit = UserEdit {
        flags: UserFlags {
            is_active: checked(&form.is_active),
            is_staff: checked(&form.is_staff),
            is_superuser: checked(&form.is_superuser),
            must_change_password: checked(&form.must_change_password),
        },
        groups: Tool::ALL
            .into_iter()
            .map(|tool| (tool.group_name(), form.wants_group(tool)))
            .collect(),
        new_password: Some(form.new_password.as_str()).filter(|p| !p.is_empty()),
    };
    state.users.apply_edit(user.id, &edit).await
}
