use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::auth_service::AuthedUser;

/// Opaque identifier assigned to a connection when it registers.
///
/// This is the only key the registry and broadcaster ever use; nothing is
/// derived from the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered connection, as protocol handlers see it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: AuthedUser,
    pub ip: IpAddr,
    pub connected_at: DateTime<Utc>,
}

/// Registry-internal handle carrying the outbound channel for one socket.
///
/// Clones are handed out only for the duration of a fan-out; the registry's
/// copy is the one that keeps the channel open.
#[derive(Clone)]
pub(crate) struct ConnHandle {
    pub id: ConnectionId,
    pub user_id: String,
    pub user_name: String,
    pub ip: IpAddr,
    pub sender: mpsc::Sender<Arc<String>>,
}
