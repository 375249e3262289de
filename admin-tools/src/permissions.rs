//! Tool permissions.
//!
//! Each tool is backed by a group; membership grants access. Superusers can
//! use every tool without being in any group.

use crate::accounts::users::{User, UserStore};
use crate::sessions::{MessageLevel, Session};
use crate::web::{DASHBOARD_URL, found};
use anyhow::Result;
use axum::response::Response;
use tracing::info;

/// Tools hosted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Annotation,
    SessionViewer,
}

impl Tool {
    /// All tools, in display order.
    pub const ALL: [Tool; 2] = [Tool::Annotation, Tool::SessionViewer];

    /// Group whose members may use this tool.
    pub fn group_name(self) -> &'static str {
        match self {
            Tool::Annotation => "annotation_users",
            Tool::SessionViewer => "session_viewers",
        }
    }

    /// Short identifier used on the command line and in forms.
    pub fn slug(self) -> &'static str {
        match self {
            Tool::Annotation => "annotation",
            Tool::SessionViewer => "session_viewer",
        }
    }

    /// Name used in permission-denied messages.
    pub fn title(self) -> &'static str {
        match self {
            Tool::Annotation => "Annotation",
            Tool::SessionViewer => "Session Viewer",
        }
    }

    pub fn url(self) -> &'static str {
        match self {
            Tool::Annotation => "/tools/annotation/",
            Tool::SessionViewer => "/tools/sessions/",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.slug() == slug)
    }
}

/// Whether `user` may use `tool`.
pub fn user_has_tool_permission(user: &User, tool: Tool) -> bool {
    user.is_superuser || user.in_group(tool.group_name())
}

/// Tools `user` may use, in display order.
pub fn available_tools(user: &User) -> Vec<Tool> {
    Tool::ALL
        .into_iter()
        .filter(|&tool| user_has_tool_permission(user, tool))
        .collect()
}

/// Add `user` to the group of `tool`. Returns false if the group does not exist.
pub async fn assign_user_to_tool(store: &UserStore, user: &User, tool: Tool) -> Result<bool> {
    let assigned = store.add_to_group(user.id, tool.group_name()).await?;
    if assigned {
        info!(user = %user.username, group = tool.group_name(), "Assigned user to tool group");
    }
    Ok(assigned)
}

/// Message shown when access to `tool` is refused.
pub fn permission_denied_message(tool: Tool) -> String {
    format!(
        "You don't have permission to access the {} tool. Please contact your administrator for access.",
        tool.title()
    )
}

/// Gate a tool page.
///
/// Returns `Err` with a redirect to the dashboard (and a queued error message)
/// when the user lacks the permission.
pub async fn require_tool_permission(
    session: &Session,
    user: &User,
    tool: Tool,
) -> Result<(), Response> {
    if user_has_tool_permission(user, tool) {
        return Ok(());
    }

    info!(user = %user.username, tool = tool.slug(), "Tool access denied");
    session
        .add_message(MessageLevel::Error, permission_denied_message(tool))
        .await;
    Err(found(DASHBOARD_URL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(groups: &[&str], is_superuser: bool) -> User {
        User {
            id: 1,
            username: "bob".into(),
            password_hash: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser,
            must_change_password: false,
            date_joined: Utc::now(),
            last_login: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_group_membership_grants_access() {
        let plain = user(&[], false);
        assert!(!user_has_tool_permission(&plain, Tool::Annotation));
        assert!(!user_has_tool_permission(&plain, Tool::SessionViewer));
        assert!(available_tools(&plain).is_empty());

        let viewer = user(&["session_viewers"], false);
        assert!(!user_has_tool_permission(&viewer, Tool::Annotation));
        assert!(user_has_tool_permission(&viewer, Tool::SessionViewer));
        assert_eq!(available_tools(&viewer), vec![Tool::SessionViewer]);
    }

    #[test]
    fn test_superuser_bypasses_groups() {
        let root = user(&[], true);
        assert_eq!(available_tools(&root), Tool::ALL.to_vec());
    }

    #[test]
    fn test_from_slug() {
        assert_eq!(Tool::from_slug("annotation"), Some(Tool::Annotation));
        assert_eq!(Tool::from_slug("session_viewer"), Some(Tool::SessionViewer));
        assert_eq!(Tool::from_slug("billing"), None);
    }

    #[test]
    fn test_denied_message() {
        assert_eq!(
            permission_denied_message(Tool::SessionViewer),
            "You don't have permission to access the Session Viewer tool. Please contact your administrator for access."
        );
    }

    #[tokio::test]
    async fn test_require_permission_queues_message() {
        let session = Session::new(None, Default::default());
        let plain = user(&[], false);

        let denied = require_tool_permission(&session, &plain, Tool::Annotation)
            .await
            .unwrap_err();
        assert_eq!(denied.status(), axum::http::StatusCode::FOUND);
        assert_eq!(denied.headers()[axum::http::header::LOCATION], "/dashboard/");

        let messages = session.take_messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Error);

        let member = user(&["annotation_users"], false);
        assert!(require_tool_permission(&session, &member, Tool::Annotation)
            .await
            .is_ok());
    }
}
