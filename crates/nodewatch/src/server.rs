//! Health and status listener.
//!
//! A small HTTP surface for liveness probes and operator curiosity when
//! the daemon runs in-cluster.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::schedule::WatchStatus;

/// State shared with the status handlers.
pub struct ServerState {
    pub status: Arc<RwLock<WatchStatus>>,
    pub poll_interval_secs: u64,
    pub rule_count: usize,
}

/// Build the health/status router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    started_at: DateTime<Utc>,
    uptime_secs: i64,
    poll_interval_secs: u64,
    rule_count: usize,
    polls_completed: u64,
    last_poll_at: Option<DateTime<Utc>>,
    last_poll_errors: usize,
}

async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let status = state.status.read().await;

    Json(StatusResponse {
        started_at: status.started_at,
        uptime_secs: (Utc::now() - status.started_at).num_seconds(),
        poll_interval_secs: state.poll_interval_secs,
        rule_count: state.rule_count,
        polls_completed: status.polls_completed,
        last_poll_at: status.last_poll_at,
        last_poll_errors: status.last_poll_errors,
    })
}

/// Bind and serve the router until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind health listener")?;

    info!(port, "Health listener started");

    axum::serve(listener, app)
        .await
        .context("Health listener error")
}
