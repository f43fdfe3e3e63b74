use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, warn};

use crate::models::{ErrorResponse, HealthResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Readiness check requested");

    // Readiness means the shared store answers, since locks, presence and
    // the relay all stop working without it.
    if let Err(e) = app_state.store.read("rt:readiness-probe").await {
        warn!("Readiness probe failed: {}", e);
        let status = StatusCode::SERVICE_UNAVAILABLE;
        return Err((
            status,
            Json(ErrorResponse::new(
                status,
                format!("Shared store unreachable: {}", e),
            )),
        ));
    }

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
    }))
}
