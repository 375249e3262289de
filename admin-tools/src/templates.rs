//! Askama templates for the site pages.

use crate::accounts::users::User;
use crate::permissions::{Tool, available_tools};
use crate::sessions::{FlashMessage, Session, SessionSummary};
use crate::tools::ToolCard;
use askama::Template;

/// Navigation entry for a tool the user may open.
pub struct NavTool {
    pub title: &'static str,
    pub url: &'static str,
}

/// Base data available to all templates
pub struct BaseContext {
    /// Logged-in user's name, None for anonymous pages
    pub username: Option<String>,
    pub display_name: String,
    pub is_admin: bool,
    pub tools: Vec<NavTool>,
    /// Flash messages, consumed by this render
    pub messages: Vec<FlashMessage>,
}

impl BaseContext {
    /// Build the base context, taking any queued flash messages.
    pub async fn new(session: &Session, user: Option<&User>) -> Self {
        let messages = session.take_messages().await;
        match user {
            Some(user) => Self {
                username: Some(user.username.clone()),
                display_name: user.display_name(),
                is_admin: user.can_access_admin(),
                tools: available_tools(user)
                    .into_iter()
                    .map(|tool: Tool| NavTool {
                        title: ToolCard::for_tool(tool).name,
                        url: tool.url(),
                    })
                    .collect(),
                messages,
            },
            None => Self {
                username: None,
                display_name: String::new(),
                is_admin: false,
                tools: Vec::new(),
                messages,
            },
        }
    }
}

/// Login page template
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub base: BaseContext,
    pub error: Option<String>,
    pub username: String,
    pub next: String,
}

/// Password change page template
#[derive(Template)]
#[template(path = "password_change.html")]
pub struct PasswordChangeTemplate {
    pub base: BaseContext,
    pub errors: Vec<String>,
    pub must_change: bool,
}

/// Dashboard page template
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub base: BaseContext,
    pub tools: Vec<ToolCard>,
    pub total_tools: usize,
    pub available_count: usize,
}

/// Annotation tool page template
#[derive(Template)]
#[template(path = "annotation.html")]
pub struct AnnotationTemplate {
    pub base: BaseContext,
    pub tool_name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub status: &'static str,
}

/// Session viewer page template
#[derive(Template)]
#[template(path = "session_viewer.html")]
pub struct SessionViewerTemplate {
    pub base: BaseContext,
    pub tool_name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub status: &'static str,
    pub sessions: Vec<SessionSummary>,
    pub total_sessions: usize,
    pub current_session_key: String,
}

/// 404 page template
#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub base: BaseContext,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::MessageLevel;
    use chrono::Utc;

    fn user(is_superuser: bool) -> User {
        User {
            id: 7,
            username: "nina".into(),
            password_hash: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: is_superuser,
            is_superuser,
            must_change_password: false,
            date_joined: Utc::now(),
            last_login: None,
            groups: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_nav_uses_dashboard_card_names() {
        let session = Session::new(None, Default::default());
        session.add_message(MessageLevel::Info, "hello").await;

        let base = BaseContext::new(&session, Some(&user(true))).await;
        let titles: Vec<_> = base.tools.iter().map(|t| t.title).collect();
        let cards: Vec<_> = Tool::ALL
            .into_iter()
            .map(|tool| ToolCard::for_tool(tool).name)
            .collect();
        assert_eq!(titles, cards);
        assert!(base.is_admin);
        assert_eq!(base.messages.len(), 1);

        let anonymous = BaseContext::new(&session, None).await;
        assert!(anonymous.tools.is_empty());
        assert!(anonymous.messages.is_empty());
    }
}
