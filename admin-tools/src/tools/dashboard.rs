//! Tool dashboard.

use crate::permissions::{Tool, available_tools};
use crate::sessions::Session;
use crate::templates::{BaseContext, DashboardTemplate};
use crate::tools::ToolCard;
use crate::web::{AuthUser, render};
use axum::response::Response;

/// Dashboard handler: one card per tool the user may open.
pub async fn dashboard(session: Session, AuthUser(user): AuthUser) -> Response {
    let tools: Vec<ToolCard> = available_tools(&user)
        .into_iter()
        .map(ToolCard::for_tool)
        .collect();

    let template = DashboardTemplate {
        base: BaseContext::new(&session, Some(&user)).await,
        available_count: tools.len(),
        total_tools: Tool::ALL.len(),
        tools,
    };
    render(&template)
}
