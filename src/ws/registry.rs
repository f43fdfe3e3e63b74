use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;

use crate::models::RoomId;
use crate::services::auth_service::AuthedUser;

use super::conn::{ConnHandle, Connection, ConnectionId};

/// Ceilings and channel sizing for a registry instance.
#[derive(Debug, Clone)]
pub struct RegistryLimits {
    pub max_connections: usize,
    pub max_connections_per_ip: usize,
    pub outbound_buffer: usize,
}

/// Why a connection attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectRejection {
    ServerFull,
    TooManyFromIp,
}

impl ConnectRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectRejection::ServerFull => "Connection limit reached",
            ConnectRejection::TooManyFromIp => "Too many connections from this address",
        }
    }
}

/// What a disconnect changed, for the caller to announce.
#[derive(Debug)]
pub struct DisconnectOutcome {
    pub user_id: String,
    pub user_name: String,
    /// Rooms in which this user no longer has any connection.
    pub rooms_left: Vec<RoomId>,
}

/// Result of adding a connection to a room.
#[derive(Debug)]
pub struct JoinInfo {
    /// Distinct user ids currently in the room, the joiner included.
    pub member_user_ids: Vec<String>,
    /// True when this user had no connection in the room before.
    pub first_for_user: bool,
}

/// Result of removing a connection from a room.
#[derive(Debug)]
pub struct LeaveInfo {
    pub was_member: bool,
    /// True when this user no longer has any connection in the room.
    pub last_for_user: bool,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnHandle>,
    by_user: HashMap<String, HashSet<ConnectionId>>,
    by_ip: HashMap<IpAddr, usize>,
    room_members: HashMap<RoomId, HashSet<ConnectionId>>,
    conn_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
}

/// Tracks every live WebSocket connection on this process and which rooms
/// each one is in.
///
/// An explicitly constructed instance, shared by reference; tests can run
/// any number of isolated registries side by side. All maps sit behind one
/// mutex, held only for map operations, never across an await.
pub struct ConnectionRegistry {
    limits: RegistryLimits,
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Pre-upgrade capacity check, so over-limit clients can be refused
    /// with a plain HTTP response instead of an accepted-then-closed socket.
    pub fn check_capacity(&self, ip: IpAddr) -> Result<(), ConnectRejection> {
        let inner = self.inner.lock().unwrap();
        if inner.connections.len() >= self.limits.max_connections {
            return Err(ConnectRejection::ServerFull);
        }
        if inner.by_ip.get(&ip).copied().unwrap_or(0) >= self.limits.max_connections_per_ip {
            return Err(ConnectRejection::TooManyFromIp);
        }
        Ok(())
    }

    /// Register a connection for `user`, allocating its id and outbound
    /// channel. The returned receiver feeds the socket writer task.
    pub fn connect(
        &self,
        user: AuthedUser,
        ip: IpAddr,
    ) -> Result<(Connection, mpsc::Receiver<Arc<String>>), ConnectRejection> {
        let mut inner = self.inner.lock().unwrap();
        if inner.connections.len() >= self.limits.max_connections {
            return Err(ConnectRejection::ServerFull);
        }
        let ip_count = inner.by_ip.get(&ip).copied().unwrap_or(0);
        if ip_count >= self.limits.max_connections_per_ip {
            return Err(ConnectRejection::TooManyFromIp);
        }

        let id = ConnectionId::new();
        let (sender, receiver) = mpsc::channel(self.limits.outbound_buffer);
        let handle = ConnHandle {
            id,
            user_id: user.uid.clone(),
            user_name: user.name.clone(),
            ip,
            sender,
        };
        inner.connections.insert(id, handle);
        inner.by_user.entry(user.uid.clone()).or_default().insert(id);
        *inner.by_ip.entry(ip).or_insert(0) += 1;

        info!(
            "Connection {} registered for user {} ({} total)",
            id,
            user.uid,
            inner.connections.len()
        );
        let connection = Connection {
            id,
            user,
            ip,
            connected_at: Utc::now(),
        };
        Ok((connection, receiver))
    }

    /// Remove a connection from every index. Idempotent; a second call for
    /// the same id returns None.
    pub fn disconnect(&self, id: ConnectionId) -> Option<DisconnectOutcome> {
        let mut inner = self.inner.lock().unwrap();
        let handle = inner.connections.remove(&id)?;

        let user_gone = inner
            .by_user
            .get_mut(&handle.user_id)
            .map(|conns| {
                conns.remove(&id);
                conns.is_empty()
            })
            .unwrap_or(false);
        if user_gone {
            inner.by_user.remove(&handle.user_id);
        }
        let ip_gone = inner
            .by_ip
            .get_mut(&handle.ip)
            .map(|count| {
                *count = count.saturating_sub(1);
                *count == 0
            })
            .unwrap_or(false);
        if ip_gone {
            inner.by_ip.remove(&handle.ip);
        }

        let mut rooms_left = Vec::new();
        if let Some(rooms) = inner.conn_rooms.remove(&id) {
            for room in rooms {
                let room_empty = inner
                    .room_members
                    .get_mut(&room)
                    .map(|members| {
                        members.remove(&id);
                        members.is_empty()
                    })
                    .unwrap_or(false);
                if room_empty {
                    inner.room_members.remove(&room);
                }
                if !user_in_room(&inner, &handle.user_id, &room) {
                    rooms_left.push(room);
                }
            }
        }

        info!(
            "Connection {} for user {} removed ({} total)",
            id,
            handle.user_id,
            inner.connections.len()
        );
        Some(DisconnectOutcome {
            user_id: handle.user_id,
            user_name: handle.user_name,
            rooms_left,
        })
    }

    /// Add a connection to a room. Joining a room you are already in is a
    /// no-op that still reports the membership. Returns None for an id that
    /// is no longer registered.
    pub fn join_room(&self, id: ConnectionId, room: &RoomId) -> Option<JoinInfo> {
        let mut inner = self.inner.lock().unwrap();
        let user_id = inner.connections.get(&id)?.user_id.clone();

        let first_for_user = !user_in_room(&inner, &user_id, room);
        inner.room_members.entry(room.clone()).or_default().insert(id);
        inner.conn_rooms.entry(id).or_default().insert(room.clone());

        let mut member_user_ids: Vec<String> = inner
            .room_members
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|conn_id| inner.connections.get(conn_id))
                    .map(|handle| handle.user_id.clone())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default();
        member_user_ids.sort();

        Some(JoinInfo {
            member_user_ids,
            first_for_user,
        })
    }

    /// Remove a connection from a room. Leaving a room the connection never
    /// joined is tolerated.
    pub fn leave_room(&self, id: ConnectionId, room: &RoomId) -> Option<LeaveInfo> {
        let mut inner = self.inner.lock().unwrap();
        let user_id = inner.connections.get(&id)?.user_id.clone();

        let was_member = inner
            .room_members
            .get_mut(room)
            .map(|members| members.remove(&id))
            .unwrap_or(false);
        if inner
            .room_members
            .get(room)
            .map(|members| members.is_empty())
            .unwrap_or(false)
        {
            inner.room_members.remove(room);
        }
        if let Some(rooms) = inner.conn_rooms.get_mut(&id) {
            rooms.remove(room);
        }

        let last_for_user = was_member && !user_in_room(&inner, &user_id, room);
        Some(LeaveInfo {
            was_member,
            last_for_user,
        })
    }

    pub fn total_connections(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }

    pub fn total_users(&self) -> usize {
        self.inner.lock().unwrap().by_user.len()
    }

    pub fn total_rooms(&self) -> usize {
        self.inner.lock().unwrap().room_members.len()
    }

    /// Room counts keyed by scope name, for diagnostics.
    pub fn rooms_by_scope(&self) -> HashMap<String, u32> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for room in inner.room_members.keys() {
            *counts.entry(room.scope().as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Member connections currently in a room.
    pub fn member_count(&self, room: &RoomId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.room_members.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Distinct user ids currently in a room, sorted.
    pub fn room_user_ids(&self, room: &RoomId) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .room_members
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|conn_id| inner.connections.get(conn_id))
                    .map(|handle| handle.user_id.clone())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn user_connection_count(&self, user_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.by_user.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_member(&self, id: ConnectionId, room: &RoomId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .conn_rooms
            .get(&id)
            .map(|rooms| rooms.contains(room))
            .unwrap_or(false)
    }

    pub(crate) fn handle(&self, id: ConnectionId) -> Option<ConnHandle> {
        self.inner.lock().unwrap().connections.get(&id).cloned()
    }

    pub(crate) fn room_handles(
        &self,
        room: &RoomId,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .room_members
            .get(room)
            .map(|members| {
                members
                    .iter()
                    .filter(|conn_id| Some(**conn_id) != exclude)
                    .filter_map(|conn_id| inner.connections.get(conn_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn user_handles(&self, user_id: &str) -> Vec<ConnHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_user
            .get(user_id)
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|conn_id| inner.connections.get(conn_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn all_handles(&self) -> Vec<ConnHandle> {
        let inner = self.inner.lock().unwrap();
        inner.connections.values().cloned().collect()
    }
}

fn user_in_room(inner: &RegistryInner, user_id: &str, room: &RoomId) -> bool {
    let Some(members) = inner.room_members.get(room) else {
        return false;
    };
    let Some(conns) = inner.by_user.get(user_id) else {
        return false;
    };
    members.iter().any(|conn_id| conns.contains(conn_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limits(max: usize, per_ip: usize) -> RegistryLimits {
        RegistryLimits {
            max_connections: max,
            max_connections_per_ip: per_ip,
            outbound_buffer: 8,
        }
    }

    fn user(uid: &str) -> AuthedUser {
        AuthedUser {
            uid: uid.to_string(),
            name: uid.to_string(),
            token_type: "user".to_string(),
            roles: Vec::new(),
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn room(s: &str) -> RoomId {
        RoomId::parse(s).unwrap()
    }

    #[test]
    fn global_ceiling_rejects_with_server_full() {
        let registry = ConnectionRegistry::new(limits(2, 10));
        let _a = registry.connect(user("a"), ip(1)).unwrap();
        let _b = registry.connect(user("b"), ip(2)).unwrap();
        let rejected = registry.connect(user("c"), ip(3)).unwrap_err();
        assert_eq!(rejected, ConnectRejection::ServerFull);
    }

    #[test]
    fn per_ip_ceiling_rejects_only_that_address() {
        let registry = ConnectionRegistry::new(limits(10, 1));
        let _a = registry.connect(user("a"), ip(1)).unwrap();
        let rejected = registry.connect(user("b"), ip(1)).unwrap_err();
        assert_eq!(rejected, ConnectRejection::TooManyFromIp);
        assert!(registry.connect(user("b"), ip(2)).is_ok());
    }

    #[test]
    fn disconnect_frees_ip_slot() {
        let registry = ConnectionRegistry::new(limits(10, 1));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        registry.disconnect(conn.id);
        assert!(registry.connect(user("b"), ip(1)).is_ok());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        assert!(registry.disconnect(conn.id).is_some());
        assert!(registry.disconnect(conn.id).is_none());
    }

    #[test]
    fn disconnect_reports_vacated_rooms() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        registry.join_room(conn.id, &room("task:1")).unwrap();
        registry.join_room(conn.id, &room("project:2")).unwrap();

        let outcome = registry.disconnect(conn.id).unwrap();
        let mut rooms: Vec<String> =
            outcome.rooms_left.iter().map(|r| r.to_string()).collect();
        rooms.sort();
        assert_eq!(rooms, vec!["project:2", "task:1"]);
        assert_eq!(registry.total_rooms(), 0);
    }

    #[test]
    fn second_session_keeps_user_in_room() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (first, _rx1) = registry.connect(user("a"), ip(1)).unwrap();
        let (second, _rx2) = registry.connect(user("a"), ip(2)).unwrap();
        let r = room("task:1");
        registry.join_room(first.id, &r).unwrap();

        let join = registry.join_room(second.id, &r).unwrap();
        assert!(!join.first_for_user);

        let outcome = registry.disconnect(first.id).unwrap();
        assert!(outcome.rooms_left.is_empty());
        assert_eq!(registry.room_user_ids(&r), vec!["a"]);

        let outcome = registry.disconnect(second.id).unwrap();
        assert_eq!(outcome.rooms_left.len(), 1);
    }

    #[test]
    fn join_lists_distinct_members() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (a1, _rx1) = registry.connect(user("a"), ip(1)).unwrap();
        let (a2, _rx2) = registry.connect(user("a"), ip(2)).unwrap();
        let (b, _rx3) = registry.connect(user("b"), ip(3)).unwrap();
        let r = room("note:7");
        registry.join_room(a1.id, &r).unwrap();
        registry.join_room(a2.id, &r).unwrap();
        let join = registry.join_room(b.id, &r).unwrap();

        assert_eq!(join.member_user_ids, vec!["a", "b"]);
        assert!(join.first_for_user);
        assert_eq!(registry.member_count(&r), 3);
    }

    #[test]
    fn leave_room_never_joined_is_tolerated() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        let info = registry.leave_room(conn.id, &room("task:1")).unwrap();
        assert!(!info.was_member);
        assert!(!info.last_for_user);
    }

    #[test]
    fn leave_undoes_join_on_both_sides() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        let r = room("task:1");
        registry.join_room(conn.id, &r).unwrap();

        let info = registry.leave_room(conn.id, &r).unwrap();
        assert!(info.was_member);
        assert!(info.last_for_user);
        assert!(!registry.is_member(conn.id, &r));
        assert_eq!(registry.member_count(&r), 0);
        assert_eq!(registry.total_rooms(), 0);
    }

    #[test]
    fn join_after_disconnect_returns_none() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (conn, _rx) = registry.connect(user("a"), ip(1)).unwrap();
        registry.disconnect(conn.id);
        assert!(registry.join_room(conn.id, &room("task:1")).is_none());
    }

    #[test]
    fn rooms_by_scope_counts_rooms_not_members() {
        let registry = ConnectionRegistry::new(limits(10, 10));
        let (a, _rx1) = registry.connect(user("a"), ip(1)).unwrap();
        let (b, _rx2) = registry.connect(user("b"), ip(2)).unwrap();
        registry.join_room(a.id, &room("task:1")).unwrap();
        registry.join_room(b.id, &room("task:1")).unwrap();
        registry.join_room(a.id, &room("project:9")).unwrap();

        let counts = registry.rooms_by_scope();
        assert_eq!(counts.get("task"), Some(&1));
        assert_eq!(counts.get("project"), Some(&1));
    }
}
