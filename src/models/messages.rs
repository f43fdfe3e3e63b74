use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::lock::{LockHolder, LockOutcomeKind};
use crate::models::presence::PresenceMember;
use crate::models::room::RoomId;

// Error codes carried in the `error` field of an error frame.
pub const ERR_MESSAGE_TOO_LARGE: &str = "MESSAGE_TOO_LARGE";
pub const ERR_INVALID_JSON: &str = "INVALID_JSON";
pub const ERR_JOIN_REFUSED: &str = "JOIN_REFUSED";
pub const ERR_LOCK_UNAVAILABLE: &str = "LOCK_UNAVAILABLE";
pub const ERR_PRESENCE_UNAVAILABLE: &str = "PRESENCE_UNAVAILABLE";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    pub room: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomMessage {
    pub room: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TypingMessage {
    pub room: RoomId,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ViewingMessage {
    pub room: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdateMessage {
    pub room: RoomId,
    /// Business event name, e.g. "task.updated". Committed by the CRUD
    /// layer before it reaches this service; we only fan it out.
    pub event: String,
    pub payload: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockRequestMessage {
    pub doc_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceHeartbeatMessage {
    pub room: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceQueryMessage {
    pub room: RoomId,
    /// Look-back window in seconds; the configured default when omitted.
    pub window_secs: Option<u64>,
}

/// Inbound frames, decoded once at the protocol boundary.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "join_room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "leave_room")]
    LeaveRoom(LeaveRoomMessage),
    #[serde(rename = "typing")]
    Typing(TypingMessage),
    #[serde(rename = "viewing")]
    Viewing(ViewingMessage),
    #[serde(rename = "entity_update")]
    EntityUpdate(EntityUpdateMessage),
    #[serde(rename = "lock_acquire")]
    LockAcquire(LockRequestMessage),
    #[serde(rename = "lock_release")]
    LockRelease(LockRequestMessage),
    #[serde(rename = "lock_heartbeat")]
    LockHeartbeat(LockRequestMessage),
    #[serde(rename = "lock_query")]
    LockQuery(LockRequestMessage),
    #[serde(rename = "presence_heartbeat")]
    PresenceHeartbeat(PresenceHeartbeatMessage),
    #[serde(rename = "presence_query")]
    PresenceQuery(PresenceQueryMessage),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedMessage {
    pub room: RoomId,
    /// User ids of the members already in the room, the joiner included.
    pub members: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomLeftMessage {
    pub room: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedMessage {
    pub room: RoomId,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftMessage {
    pub room: RoomId,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TypingEventMessage {
    pub room: RoomId,
    pub user_id: String,
    pub user_name: String,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ViewingEventMessage {
    pub room: RoomId,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EntityUpdateEventMessage {
    pub room: RoomId,
    pub event: String,
    pub payload: Value,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockResultMessage {
    pub doc_id: Uuid,
    pub outcome: LockOutcomeKind,
    /// The caller on acquired/renewed, the competing user on conflict.
    pub holder: Option<LockHolder>,
    pub ttl_secs: u64,
    /// Recommended client heartbeat period, one third of the TTL.
    pub heartbeat_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockReleasedMessage {
    pub doc_id: Uuid,
    pub released: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockHeartbeatAckMessage {
    pub doc_id: Uuid,
    pub renewed: bool,
    pub ttl_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockStateMessage {
    pub doc_id: Uuid,
    pub holder: Option<LockHolder>,
    pub ttl_secs: Option<u64>,
}

/// Sent to a holder whose lock was taken over by a privileged caller.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LockTakenMessage {
    pub doc_id: Uuid,
    pub new_holder: LockHolder,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStateMessage {
    pub room: RoomId,
    pub members: Vec<PresenceMember>,
}

/// Outbound frames. Every request gets one of these back; broadcasts reuse
/// the same envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(ErrorMessage),
    #[serde(rename = "room_joined")]
    RoomJoined(RoomJoinedMessage),
    #[serde(rename = "room_left")]
    RoomLeft(RoomLeftMessage),
    #[serde(rename = "user_joined")]
    UserJoined(UserJoinedMessage),
    #[serde(rename = "user_left")]
    UserLeft(UserLeftMessage),
    #[serde(rename = "typing")]
    Typing(TypingEventMessage),
    #[serde(rename = "viewing")]
    Viewing(ViewingEventMessage),
    #[serde(rename = "entity_update")]
    EntityUpdate(EntityUpdateEventMessage),
    #[serde(rename = "lock_result")]
    LockResult(LockResultMessage),
    #[serde(rename = "lock_released")]
    LockReleased(LockReleasedMessage),
    #[serde(rename = "lock_heartbeat_ack")]
    LockHeartbeatAck(LockHeartbeatAckMessage),
    #[serde(rename = "lock_state")]
    LockState(LockStateMessage),
    #[serde(rename = "lock_taken")]
    LockTaken(LockTakenMessage),
    #[serde(rename = "presence_state")]
    PresenceState(PresenceStateMessage),
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            error: code.to_string(),
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_decodes_from_bare_type_envelope() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn pong_serializes_to_bare_type_envelope() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn error_frames_match_the_wire_contract() {
        let msg = ServerMessage::error(ERR_MESSAGE_TOO_LARGE, "frame of 2097152 bytes exceeds limit");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["error"], "MESSAGE_TOO_LARGE");
        assert!(value["data"]["message"].as_str().unwrap().contains("2097152"));
    }

    #[test]
    fn join_room_decodes_typed_room_ids() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join_room","data":{"room":"project:P1"}}"#).unwrap();
        match msg {
            ClientMessage::JoinRoom(join) => assert_eq!(join.room.to_string(), "project:P1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_types_and_bad_rooms_fail_decode() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe","data":{}}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(
            r#"{"type":"join_room","data":{"room":"nope"}}"#
        )
        .is_err());
    }

    #[test]
    fn lock_result_uses_camel_case_payload_fields() {
        let msg = ServerMessage::LockResult(LockResultMessage {
            doc_id: Uuid::nil(),
            outcome: LockOutcomeKind::Conflict,
            holder: None,
            ttl_secs: 300,
            heartbeat_secs: 100,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "lock_result");
        assert_eq!(value["data"]["outcome"], "conflict");
        assert_eq!(value["data"]["ttlSecs"], 300);
        assert_eq!(value["data"]["heartbeatSecs"], 100);
    }
}
