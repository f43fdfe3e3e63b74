use std::sync::Arc;
use tracing::{error, info};

use crate::models::messages::{
    JoinRoomMessage, LeaveRoomMessage, RoomJoinedMessage, RoomLeftMessage, UserJoinedMessage,
    UserLeftMessage, ERR_JOIN_REFUSED,
};
use crate::models::ServerMessage;
use crate::ws::Connection;
use crate::AppState;

/// Handle a join_room frame
///
/// The authorizer is consulted on every join. A denial, and equally an
/// authorizer outage, comes back as a JOIN_REFUSED error so the client can
/// tell the user instead of silently hearing nothing.
pub async fn handle_join_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    join_msg: &JoinRoomMessage,
) -> Vec<ServerMessage> {
    info!("User {} joining room {}", conn.user.uid, join_msg.room);

    // Personal rooms admit only their owner.
    if !join_msg.room.is_joinable_by(&conn.user.uid) {
        return vec![refused(join_msg)];
    }

    match app_state.authorizer.can_join(&conn.user, &join_msg.room).await {
        Ok(true) => {}
        Ok(false) => {
            info!(
                "User {} refused entry to room {}",
                conn.user.uid, join_msg.room
            );
            return vec![refused(join_msg)];
        }
        Err(e) => {
            error!(
                "Authorization check failed for user {} in room {}: {}",
                conn.user.uid, join_msg.room, e
            );
            return vec![refused(join_msg)];
        }
    }

    let Some(join) = app_state.registry.join_room(conn.id, &join_msg.room) else {
        // The connection disappeared while we were authorizing.
        return Vec::new();
    };

    if join.first_for_user {
        let announce = ServerMessage::UserJoined(UserJoinedMessage {
            room: join_msg.room.clone(),
            user_id: conn.user.uid.clone(),
            user_name: conn.user.name.clone(),
        });
        app_state
            .broadcaster
            .broadcast_to_room(&join_msg.room, &announce, Some(conn.id))
            .await;
    }

    vec![ServerMessage::RoomJoined(RoomJoinedMessage {
        room: join_msg.room.clone(),
        members: join.member_user_ids,
    })]
}

/// Handle a leave_room frame. Leaving a room you are not in is still
/// acknowledged.
pub async fn handle_leave_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    leave_msg: &LeaveRoomMessage,
) -> Vec<ServerMessage> {
    let Some(leave) = app_state.registry.leave_room(conn.id, &leave_msg.room) else {
        return Vec::new();
    };

    if leave.last_for_user {
        let announce = ServerMessage::UserLeft(UserLeftMessage {
            room: leave_msg.room.clone(),
            user_id: conn.user.uid.clone(),
        });
        app_state
            .broadcaster
            .broadcast_to_room(&leave_msg.room, &announce, Some(conn.id))
            .await;
    }

    vec![ServerMessage::RoomLeft(RoomLeftMessage {
        room: leave_msg.room.clone(),
    })]
}

fn refused(join_msg: &JoinRoomMessage) -> ServerMessage {
    ServerMessage::error(
        ERR_JOIN_REFUSED,
        format!("Not allowed to join {}", join_msg.room),
    )
}
