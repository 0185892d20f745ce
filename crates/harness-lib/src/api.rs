//! HTTP API for monitor status and Prometheus metrics

use crate::monitor::{MonitorPhase, MonitorState};
use crate::observability::HarnessMetrics;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorState>,
    pub metrics: HarnessMetrics,
}

impl AppState {
    pub fn new(monitor: Arc<MonitorState>, metrics: HarnessMetrics) -> Self {
        Self { monitor, metrics }
    }
}

/// Monitor status - 200 until the monitor fails, then 503
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();

    let status_code = match snapshot.status {
        MonitorPhase::Idle | MonitorPhase::Running | MonitorPhase::Stopped => StatusCode::OK,
        MonitorPhase::Failed => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(snapshot))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = match state.metrics.encode_text() {
        Ok(buffer) => (StatusCode::OK, buffer),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string().into_bytes()),
    };

    (status, [("content-type", "text/plain; charset=utf-8")], body)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting status API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
