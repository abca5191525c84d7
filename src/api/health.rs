//! Health check endpoints
//!
//! Liveness for load balancers plus a richer status view that includes the
//! credential pool counters.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::state::AppState;
use crate::services::PoolStats;

/// Response for the ping endpoint
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Response for the main health check endpoint
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub credentials: PoolStats,
}

/// Liveness probe
///
/// GET /ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        message: "pong",
    })
}

/// Main health check endpoint
///
/// Returns version, uptime and credential pool counters. A fully
/// rate-limited pool still reports healthy; the counters say why calls fail.
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let credentials = state.docs.pool_stats();
    if credentials.total > 0 && credentials.available == 0 {
        tracing::debug!(failed = credentials.failed, "All pooled credentials are rate-limited");
    }

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.settings.app_version.clone(),
        environment: state.settings.environment.to_string(),
        uptime_seconds: state.uptime_seconds(),
        credentials,
    })
}
