//! Session viewer: lists active sessions and who they belong to.

use crate::permissions::{Tool, require_tool_permission};
use crate::sessions::{Session, list_active_sessions, listing::truncate_key};
use crate::state::AppState;
use crate::templates::{BaseContext, SessionViewerTemplate};
use crate::web::{AuthUser, internal_error, render};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use tracing::error;

const FEATURES: &[&str] = &[
    "View Active Sessions",
    "Monitor User Activity",
    "Session Data Analysis",
    "Security Monitoring",
    "Session Management Tools",
];

pub async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
    AuthUser(user): AuthUser,
) -> Response {
    if let Err(denied) = require_tool_permission(&session, &user, Tool::SessionViewer).await {
        return denied;
    }

    let current_key = session.key().await;
    let sessions = match list_active_sessions(
        &state.sessions,
        &state.users,
        &state.codec,
        current_key.as_deref(),
    )
    .await
    {
        Ok(sessions) => sessions,
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            return internal_error();
        }
    };

    let template = SessionViewerTemplate {
        base: BaseContext::new(&session, Some(&user)).await,
        tool_name: "Session Viewer",
        description: "Monitor and manage active user sessions",
        features: FEATURES,
        status: "Active",
        total_sessions: sessions.len(),
        current_session_key: current_key.as_deref().map(truncate_key).unwrap_or_default(),
        sessions,
    };
    render(&template)
}
