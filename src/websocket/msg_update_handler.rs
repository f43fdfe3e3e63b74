use std::sync::Arc;
use tracing::{debug, info};

use crate::models::messages::{
    EntityUpdateEventMessage, EntityUpdateMessage, TypingEventMessage, TypingMessage,
    ViewingEventMessage, ViewingMessage,
};
use crate::models::{RoomId, ServerMessage};
use crate::ws::{Connection, ConnectionId};
use crate::AppState;

/// Handle a typing frame
pub async fn handle_typing_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    typing_msg: &TypingMessage,
) -> Vec<ServerMessage> {
    if !member_of(app_state, conn.id, &typing_msg.room) {
        return Vec::new();
    }
    let event = ServerMessage::Typing(TypingEventMessage {
        room: typing_msg.room.clone(),
        user_id: conn.user.uid.clone(),
        user_name: conn.user.name.clone(),
        active: typing_msg.active,
    });
    app_state
        .broadcaster
        .broadcast_to_room(&typing_msg.room, &event, Some(conn.id))
        .await;
    Vec::new()
}

/// Handle a viewing frame
pub async fn handle_viewing_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    viewing_msg: &ViewingMessage,
) -> Vec<ServerMessage> {
    if !member_of(app_state, conn.id, &viewing_msg.room) {
        return Vec::new();
    }
    let event = ServerMessage::Viewing(ViewingEventMessage {
        room: viewing_msg.room.clone(),
        user_id: conn.user.uid.clone(),
        user_name: conn.user.name.clone(),
    });
    app_state
        .broadcaster
        .broadcast_to_room(&viewing_msg.room, &event, Some(conn.id))
        .await;
    Vec::new()
}

/// Handle an entity_update frame
///
/// The payload is passed through opaquely; everyone in the room except the
/// sending connection receives it. The sender's other sessions do receive
/// it, which is how multiple tabs stay in sync.
pub async fn handle_entity_update_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    update_msg: &EntityUpdateMessage,
) -> Vec<ServerMessage> {
    if !member_of(app_state, conn.id, &update_msg.room) {
        return Vec::new();
    }
    info!(
        "Entity update in room {} from user {}: {}",
        update_msg.room, conn.user.uid, update_msg.event
    );
    let event = ServerMessage::EntityUpdate(EntityUpdateEventMessage {
        room: update_msg.room.clone(),
        event: update_msg.event.clone(),
        payload: update_msg.payload.clone(),
        user_id: conn.user.uid.clone(),
    });
    app_state
        .broadcaster
        .broadcast_to_room(&update_msg.room, &event, Some(conn.id))
        .await;
    Vec::new()
}

// Activity frames for rooms the connection never joined are dropped; a
// join refusal must not be sidestepped by broadcasting anyway.
fn member_of(app_state: &Arc<AppState>, id: ConnectionId, room: &RoomId) -> bool {
    let member = app_state.registry.is_member(id, room);
    if !member {
        debug!("Dropping activity frame for non-member of {}", room);
    }
    member
}
