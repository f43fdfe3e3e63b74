use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::diagnostics::get_diagnostics;
use crate::handlers::health::{health_check, ready_check};
use crate::handlers::lock_admin::{force_take_lock, lock_status};
use crate::handlers::presence_admin::cleanup_presence;
use crate::routes::auth_middleware::auth_middleware;
use crate::state::AppState;

pub fn create_api_routes(app_state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(get_diagnostics))
        .route("/v1/documents/:doc_id/lock", get(lock_status))
        .route("/v1/documents/:doc_id/lock/force", post(force_take_lock))
        .route("/v1/presence/:room_id/cleanup", post(cleanup_presence))
        // Applies to all routes added above
        .route_layer(middleware::from_fn(auth_middleware))
        .route("/v1/health", get(health_check))
        .route("/v1/ready", get(ready_check))
        .with_state(app_state)
}
