use crate::models::*;
use utoipa::OpenApi;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Shared store unreachable", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Connection and host diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Diagnostics snapshot", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Current holder of a document lock
#[utoipa::path(
    get,
    path = "/api/v1/documents/{doc_id}/lock",
    params(
        ("doc_id" = String, Path, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "Lock state, holder absent when free", body = LockStatus),
        (status = 400, description = "Malformed document UUID", body = ErrorResponse),
        (status = 503, description = "Lock store unreachable", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[allow(dead_code)]
pub async fn lock_status_doc() {}

/// Reassign a document lock regardless of its holder
#[utoipa::path(
    post,
    path = "/api/v1/documents/{doc_id}/lock/force",
    params(
        ("doc_id" = String, Path, description = "Document UUID")
    ),
    request_body = ForceTakeRequest,
    responses(
        (status = 200, description = "Lock reassigned", body = ForceTakeResponse),
        (status = 400, description = "Malformed document UUID", body = ErrorResponse),
        (status = 403, description = "Caller is not a service or admin", body = ErrorResponse),
        (status = 503, description = "Lock store unreachable", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[allow(dead_code)]
pub async fn force_take_lock_doc() {}

/// Prune stale presence entries from a room
#[utoipa::path(
    post,
    path = "/api/v1/presence/{room_id}/cleanup",
    params(
        ("room_id" = String, Path, description = "Room key in scope:entity-id form")
    ),
    responses(
        (status = 200, description = "Stale entries removed", body = PresenceCleanupResponse),
        (status = 400, description = "Malformed room id", body = ErrorResponse),
        (status = 403, description = "Caller is not a service or admin", body = ErrorResponse),
        (status = 503, description = "Presence store unreachable", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
#[allow(dead_code)]
pub async fn cleanup_presence_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        lock_status_doc,
        force_take_lock_doc,
        cleanup_presence_doc,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            DiagnosticsResponse,
            LockHolder,
            LockStatus,
            ForceTakeRequest,
            ForceTakeResponse,
            PresenceCleanupResponse
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
