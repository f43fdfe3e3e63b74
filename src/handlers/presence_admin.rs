use crate::auth::auth;
use crate::models::{ErrorResponse, PresenceCleanupResponse, RoomId};
use crate::services::auth_service::AuthedUser;
use crate::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::error;

/// Prune stale presence entries from a room's roster
pub async fn cleanup_presence(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<PresenceCleanupResponse>), (StatusCode, Json<ErrorResponse>)> {
    // Ensure the caller is a service or an admin
    auth::ensure_service_or_admin(&user)?;

    // Parse the room id
    let room = match RoomId::parse(&room_id) {
        Ok(room) => room,
        Err(e) => {
            let status = StatusCode::BAD_REQUEST;
            return Err((
                status,
                Json(ErrorResponse::new(status, format!("Invalid room id: {}", e))),
            ));
        }
    };

    let removed = match app_state.presence.cleanup(&room).await {
        Ok(removed) => removed,
        Err(e) => {
            error!("Presence cleanup for {} failed: {}", room, e);
            let status = StatusCode::SERVICE_UNAVAILABLE;
            return Err((
                status,
                Json(ErrorResponse::new(
                    status,
                    format!("Presence tracking unavailable: {}", e),
                )),
            ));
        }
    };

    Ok((
        StatusCode::OK,
        Json(PresenceCleanupResponse {
            room: room.to_string(),
            removed,
        }),
    ))
}
