//! Shared helpers for the integration suites.
//!
//! Tests build full [`AppState`] graphs over one in-process store, so two
//! states stand in for two server processes sharing a Redis instance.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use tasklane_realtime::config::Config;
use tasklane_realtime::models::ServerMessage;
use tasklane_realtime::services::auth_service::AuthedUser;
use tasklane_realtime::services::authorizer::AllowAllAuthorizer;
use tasklane_realtime::state::AppState;
use tasklane_realtime::store::{MemoryStore, SharedStore};
use tasklane_realtime::ws::{Connection, RelayListener};

/// A fresh in-process store, shared between states to model one Redis.
pub fn shared_store() -> Arc<dyn SharedStore> {
    Arc::new(MemoryStore::new())
}

/// One "process": a complete service graph over the given store.
pub fn build_state(store: Arc<dyn SharedStore>) -> Arc<AppState> {
    let config = Config {
        ws_max_frame_bytes: 4096,
        lock_ttl_secs: 30,
        presence_window_secs: 5,
        ..Config::default()
    };
    AppState::build(config, store, Arc::new(AllowAllAuthorizer::new()))
}

/// Start the cross-process relay listener for a state. Keep the returned
/// handle alive for as long as the test needs deliveries.
pub async fn start_relay(state: &Arc<AppState>) -> RelayListener {
    RelayListener::start(
        state.store.clone(),
        state.registry.clone(),
        state.broadcaster.clone(),
        state.broadcaster.origin(),
    )
    .await
    .expect("relay listener failed to start")
}

pub fn user(uid: &str) -> AuthedUser {
    AuthedUser {
        uid: uid.to_string(),
        name: format!("User {}", uid),
        token_type: "user".to_string(),
        roles: Vec::new(),
    }
}

pub fn service_account(uid: &str) -> AuthedUser {
    AuthedUser {
        uid: uid.to_string(),
        name: uid.to_string(),
        token_type: "service".to_string(),
        roles: Vec::new(),
    }
}

pub fn client_ip(last_octet: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, last_octet))
}

/// Register a connection the way the socket handler would, returning the
/// connection and the outbound frame channel a real socket would drain.
pub fn connect(
    state: &Arc<AppState>,
    uid: &str,
    ip_octet: u8,
) -> (Connection, mpsc::Receiver<Arc<String>>) {
    state
        .registry
        .connect(user(uid), client_ip(ip_octet))
        .expect("connection was rejected")
}

/// Next outbound frame on a connection, decoded. Panics after two seconds
/// so a missing delivery fails the test instead of hanging it.
pub async fn next_message(rx: &mut mpsc::Receiver<Arc<String>>) -> ServerMessage {
    let frame = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an outbound frame")
        .expect("outbound channel closed");
    serde_json::from_str(&frame).expect("outbound frame did not decode")
}

/// Assert that nothing arrives on a connection for a short grace period.
pub async fn expect_silence(rx: &mut mpsc::Receiver<Arc<String>>) {
    if let Ok(Some(frame)) = timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("expected no outbound frame, got {}", frame);
    }
}
