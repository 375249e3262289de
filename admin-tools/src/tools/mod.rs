//! Dashboard and the tool pages behind it.

pub mod annotation;
pub mod dashboard;
pub mod session_viewer;

use crate::permissions::Tool;
use crate::state::AppState;
use axum::{Router, routing::get};
use std::sync::Arc;

/// Card shown on the dashboard for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCard {
    pub name: &'static str,
    pub description: &'static str,
    /// Bootstrap icon class
    pub icon: &'static str,
    /// Bootstrap colour name
    pub color: &'static str,
    pub url: &'static str,
    pub status: &'static str,
}

impl ToolCard {
    pub fn for_tool(tool: Tool) -> Self {
        match tool {
            Tool::Annotation => ToolCard {
                name: "Annotation Tool",
                description: "Annotate and label data for machine learning and analysis",
                icon: "bi-pencil-square",
                color: "primary",
                url: tool.url(),
                status: "Active",
            },
            Tool::SessionViewer => ToolCard {
                name: "Session Viewer",
                description: "Monitor active user sessions and manage session data",
                icon: "bi-eye",
                color: "success",
                url: tool.url(),
                status: "Active",
            },
        }
    }
}

/// Build the dashboard and tool router.
pub fn tools_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/", get(dashboard::dashboard))
        .route("/tools/annotation/", get(annotation::index))
        .route("/tools/sessions/", get(session_viewer::index))
}
