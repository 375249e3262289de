//! Askama templates for the admin site.

use crate::accounts::users::User;
use crate::templates::BaseContext;
use askama::Template;

/// Members of one tool group.
pub struct GroupSummary {
    pub tool_title: &'static str,
    pub group_name: &'static str,
    pub members: Vec<String>,
}

/// Values echoed back into the create form after a failed submission.
#[derive(Default)]
pub struct CreateFormValues {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub must_change_password: bool,
}

/// Admin index: user list, groups and create form
#[derive(Template)]
#[template(path = "admin/index.html")]
pub struct AdminIndexTemplate {
    pub base: BaseContext,
    /// Whether the superuser checkbox is offered
    pub can_grant_superuser: bool,
    pub users: Vec<User>,
    pub groups: Vec<GroupSummary>,
    pub form: CreateFormValues,
    pub errors: Vec<String>,
}

/// Tool group checkbox on the user edit page.
pub struct GroupMembership {
    pub field: &'static str,
    pub tool_title: &'static str,
    pub member: bool,
}

/// Admin user edit page
#[derive(Template)]
#[template(path = "admin/user.html")]
pub struct AdminUserTemplate {
    pub base: BaseContext,
    pub can_grant_superuser: bool,
    pub user: User,
    pub memberships: Vec<GroupMembership>,
    pub errors: Vec<String>,
}

/// 403 page
#[derive(Template)]
#[template(path = "admin/forbidden.html")]
pub struct ForbiddenTemplate {
    pub base: BaseContext,
    pub reason: &'static str,
}
