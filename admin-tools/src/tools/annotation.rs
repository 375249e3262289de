//! Annotation tool. Placeholder page until the annotation workflow lands.

use crate::permissions::{Tool, require_tool_permission};
use crate::sessions::Session;
use crate::templates::{AnnotationTemplate, BaseContext};
use crate::web::{AuthUser, render};
use axum::response::Response;

const FEATURES: &[&str] = &[
    "Data Import and Export",
    "Multiple Annotation Types (Labels, Categories, Text)",
    "User Management and Assignments",
    "Progress Tracking and Analytics",
    "Quality Control and Review Workflow",
];

pub async fn index(session: Session, AuthUser(user): AuthUser) -> Response {
    if let Err(denied) = require_tool_permission(&session, &user, Tool::Annotation).await {
        return denied;
    }

    let template = AnnotationTemplate {
        base: BaseContext::new(&session, Some(&user)).await,
        tool_name: "Annotation Tool",
        description: "Data annotation and labeling platform",
        features: FEATURES,
        status: "Under Development",
    };
    render(&template)
}
