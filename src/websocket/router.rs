use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::messages::{ERR_INVALID_JSON, ERR_MESSAGE_TOO_LARGE};
use crate::models::{ClientMessage, ServerMessage};
use crate::ws::Connection;
use crate::AppState;

use super::msg_lock_handler::{
    handle_lock_acquire_message, handle_lock_heartbeat_message, handle_lock_query_message,
    handle_lock_release_message,
};
use super::msg_ping_handler::handle_ping_message;
use super::msg_presence_handler::{
    handle_presence_heartbeat_message, handle_presence_query_message,
};
use super::msg_room_handler::{handle_join_message, handle_leave_message};
use super::msg_update_handler::{
    handle_entity_update_message, handle_typing_message, handle_viewing_message,
};

/// Route one inbound text frame to its handler and collect the direct
/// replies for the sending connection.
///
/// A frame over the size ceiling or one that does not decode gets an error
/// reply; neither closes the connection.
pub async fn handle_frame(
    app_state: &Arc<AppState>,
    conn: &Connection,
    raw: &str,
) -> Vec<ServerMessage> {
    let max_bytes = app_state.config.ws_max_frame_bytes;
    if raw.len() > max_bytes {
        warn!(
            "Oversized frame ({} bytes) from connection {}",
            raw.len(),
            conn.id
        );
        return vec![ServerMessage::error(
            ERR_MESSAGE_TOO_LARGE,
            format!("Frame exceeds {} bytes", max_bytes),
        )];
    }

    let client_msg: ClientMessage = match serde_json::from_str(raw) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Undecodable frame from connection {}: {}", conn.id, e);
            return vec![ServerMessage::error(
                ERR_INVALID_JSON,
                "Frame is not a recognized message",
            )];
        }
    };

    match client_msg {
        ClientMessage::Ping => handle_ping_message(conn),
        ClientMessage::JoinRoom(msg) => handle_join_message(app_state, conn, &msg).await,
        ClientMessage::LeaveRoom(msg) => handle_leave_message(app_state, conn, &msg).await,
        ClientMessage::Typing(msg) => handle_typing_message(app_state, conn, &msg).await,
        ClientMessage::Viewing(msg) => handle_viewing_message(app_state, conn, &msg).await,
        ClientMessage::EntityUpdate(msg) => {
            handle_entity_update_message(app_state, conn, &msg).await
        }
        ClientMessage::LockAcquire(msg) => handle_lock_acquire_message(app_state, conn, &msg).await,
        ClientMessage::LockRelease(msg) => handle_lock_release_message(app_state, conn, &msg).await,
        ClientMessage::LockHeartbeat(msg) => {
            handle_lock_heartbeat_message(app_state, conn, &msg).await
        }
        ClientMessage::LockQuery(msg) => handle_lock_query_message(app_state, &msg).await,
        ClientMessage::PresenceHeartbeat(msg) => {
            handle_presence_heartbeat_message(app_state, conn, &msg).await
        }
        ClientMessage::PresenceQuery(msg) => handle_presence_query_message(app_state, &msg).await,
    }
}
