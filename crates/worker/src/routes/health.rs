use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub worker: bool,
    /// Resident memory in MiB.
    pub ram_usage: u64,
    pub ram_limit: u64,
    pub active_jobs: usize,
    pub max_jobs: usize,
    /// Admitted jobs still waiting for the queue.
    pub queued_jobs: usize,
}

/// GET /health -- worker load snapshot. Never fails.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        worker: true,
        ram_usage: state.monitor.current_mb(),
        ram_limit: state.monitor.ram_limit_mb(),
        active_jobs: state.monitor.active_jobs(),
        max_jobs: state.monitor.max_jobs(),
        queued_jobs: state.queue.pending(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
