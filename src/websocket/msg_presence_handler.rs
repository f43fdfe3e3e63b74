use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::models::messages::{
    PresenceHeartbeatMessage, PresenceQueryMessage, PresenceStateMessage, ERR_PRESENCE_UNAVAILABLE,
};
use crate::models::ServerMessage;
use crate::ws::Connection;
use crate::AppState;

/// Handle a presence_heartbeat frame. Success is silent; heartbeats are
/// frequent and an ack per beat would double the chatter.
pub async fn handle_presence_heartbeat_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    beat_msg: &PresenceHeartbeatMessage,
) -> Vec<ServerMessage> {
    match app_state
        .presence
        .heartbeat(&beat_msg.room, &conn.user.uid)
        .await
    {
        Ok(()) => Vec::new(),
        Err(e) => {
            error!("Presence heartbeat failed for room {}: {}", beat_msg.room, e);
            vec![presence_unavailable()]
        }
    }
}

/// Handle a presence_query frame
pub async fn handle_presence_query_message(
    app_state: &Arc<AppState>,
    query_msg: &PresenceQueryMessage,
) -> Vec<ServerMessage> {
    let window = query_msg.window_secs.map(Duration::from_secs);
    match app_state.presence.query(&query_msg.room, window).await {
        Ok(members) => vec![ServerMessage::PresenceState(PresenceStateMessage {
            room: query_msg.room.clone(),
            members,
        })],
        Err(e) => {
            error!("Presence query failed for room {}: {}", query_msg.room, e);
            vec![presence_unavailable()]
        }
    }
}

fn presence_unavailable() -> ServerMessage {
    ServerMessage::error(ERR_PRESENCE_UNAVAILABLE, "Presence tracking unavailable")
}
