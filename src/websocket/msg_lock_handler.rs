use std::sync::Arc;
use tracing::error;

use crate::models::messages::{
    LockHeartbeatAckMessage, LockReleasedMessage, LockRequestMessage, LockResultMessage,
    LockStateMessage, ERR_LOCK_UNAVAILABLE,
};
use crate::models::{LockOutcome, LockOutcomeKind, ServerMessage};
use crate::ws::Connection;
use crate::AppState;

/// Handle a lock_acquire frame
pub async fn handle_lock_acquire_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    lock_msg: &LockRequestMessage,
) -> Vec<ServerMessage> {
    let locks = &app_state.locks;
    match locks
        .acquire(&lock_msg.doc_id, &conn.user.uid, &conn.user.name)
        .await
    {
        Ok(outcome) => {
            let (kind, holder) = match outcome {
                LockOutcome::Acquired => (LockOutcomeKind::Acquired, None),
                LockOutcome::Renewed => (LockOutcomeKind::Renewed, None),
                LockOutcome::Conflict(holder) => (LockOutcomeKind::Conflict, Some(holder)),
            };
            vec![ServerMessage::LockResult(LockResultMessage {
                doc_id: lock_msg.doc_id,
                outcome: kind,
                holder,
                ttl_secs: locks.ttl_secs(),
                heartbeat_secs: locks.heartbeat_secs(),
            })]
        }
        Err(e) => {
            error!("Lock acquire failed for document {}: {}", lock_msg.doc_id, e);
            vec![lock_unavailable()]
        }
    }
}

/// Handle a lock_release frame
pub async fn handle_lock_release_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    lock_msg: &LockRequestMessage,
) -> Vec<ServerMessage> {
    match app_state
        .locks
        .release(&lock_msg.doc_id, &conn.user.uid)
        .await
    {
        Ok(released) => vec![ServerMessage::LockReleased(LockReleasedMessage {
            doc_id: lock_msg.doc_id,
            released,
        })],
        Err(e) => {
            error!("Lock release failed for document {}: {}", lock_msg.doc_id, e);
            vec![lock_unavailable()]
        }
    }
}

/// Handle a lock_heartbeat frame. `renewed: false` tells the client its
/// lock expired or was taken over and editing should stop.
pub async fn handle_lock_heartbeat_message(
    app_state: &Arc<AppState>,
    conn: &Connection,
    lock_msg: &LockRequestMessage,
) -> Vec<ServerMessage> {
    let locks = &app_state.locks;
    match locks.heartbeat(&lock_msg.doc_id, &conn.user.uid).await {
        Ok(renewed) => vec![ServerMessage::LockHeartbeatAck(LockHeartbeatAckMessage {
            doc_id: lock_msg.doc_id,
            renewed,
            ttl_secs: locks.ttl_secs(),
        })],
        Err(e) => {
            error!(
                "Lock heartbeat failed for document {}: {}",
                lock_msg.doc_id, e
            );
            vec![lock_unavailable()]
        }
    }
}

/// Handle a lock_query frame
pub async fn handle_lock_query_message(
    app_state: &Arc<AppState>,
    lock_msg: &LockRequestMessage,
) -> Vec<ServerMessage> {
    match app_state.locks.query(&lock_msg.doc_id).await {
        Ok(state) => {
            let (holder, ttl_secs) = match state {
                Some((holder, ttl)) => (Some(holder), ttl.map(|t| t.as_secs())),
                None => (None, None),
            };
            vec![ServerMessage::LockState(LockStateMessage {
                doc_id: lock_msg.doc_id,
                holder,
                ttl_secs,
            })]
        }
        Err(e) => {
            error!("Lock query failed for document {}: {}", lock_msg.doc_id, e);
            vec![lock_unavailable()]
        }
    }
}

fn lock_unavailable() -> ServerMessage {
    ServerMessage::error(ERR_LOCK_UNAVAILABLE, "Lock coordination unavailable")
}
