//! HTTP server: router assembly, host validation and the serve loop.

use crate::accounts::{accounts_router, force_password_change};
use crate::admin::admin_router;
use crate::sessions::{Session, session_layer};
use crate::state::AppState;
use crate::templates::{BaseContext, NotFoundTemplate};
use crate::tools::tools_router;
use crate::web::{CurrentUser, render_with_status};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the full application router.
///
/// Layers, outermost first: host validation, sessions, password gate.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(accounts_router())
        .merge(tools_router())
        .merge(admin_router())
        .fallback(not_found)
        .layer(middleware::from_fn(force_password_change))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            check_allowed_host,
        ))
        .with_state(state)
}

/// Reject requests whose `Host` header is not in `allowed_hosts`.
async fn check_allowed_host(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or("");

    if !state.config.is_host_allowed(host) {
        warn!(host, "Rejected request for disallowed host");
        return (StatusCode::BAD_REQUEST, "Bad Request (400)").into_response();
    }

    next.run(request).await
}

async fn not_found(session: Session, CurrentUser(user): CurrentUser) -> Response {
    let template = NotFoundTemplate {
        base: BaseContext::new(&session, user.as_ref()).await,
    };
    render_with_status(StatusCode::NOT_FOUND, &template)
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(listen_addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;

    info!(addr = %listen_addr, "Starting HTTP server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
