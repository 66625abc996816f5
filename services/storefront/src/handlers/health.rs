//! Health check handler

use axum::{extract::State, response::Json};
use tracing::debug;

use crate::models::{ApiResponse, HealthCheckResponse};
use crate::server::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthCheckResponse>> {
    debug!("Health check request");

    let status = if state.tenant_count > 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(ApiResponse::success(HealthCheckResponse {
        status: status.to_string(),
        tenants: state.tenant_count,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }))
}
