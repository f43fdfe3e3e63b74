//! End-to-end message flow through the frame router, registry and
//! broadcaster, including fan-out across two simulated processes joined by
//! the shared-store relay.

mod common;

use chrono::Utc;
use tasklane_realtime::models::{
    LockHolder, LockTakenMessage, ServerMessage, ERR_INVALID_JSON, ERR_JOIN_REFUSED,
    ERR_MESSAGE_TOO_LARGE,
};
use tasklane_realtime::websocket::router;
use uuid::Uuid;

const JOIN_P1: &str = r#"{"type":"join_room","data":{"room":"project:P1"}}"#;
const TYPING_P1: &str = r#"{"type":"typing","data":{"room":"project:P1","active":true}}"#;

#[tokio::test]
async fn room_fanout_reaches_members_and_skips_the_sender() {
    let state = common::build_state(common::shared_store());
    let (alice, mut alice_rx) = common::connect(&state, "alice", 1);
    let (bob, mut bob_rx) = common::connect(&state, "bob", 2);
    let (carol, mut carol_rx) = common::connect(&state, "carol", 3);

    let replies = router::handle_frame(&state, &alice, JOIN_P1).await;
    match &replies[0] {
        ServerMessage::RoomJoined(m) => assert_eq!(m.members, ["alice"]),
        other => panic!("unexpected reply: {:?}", other),
    }

    let replies = router::handle_frame(&state, &bob, JOIN_P1).await;
    match &replies[0] {
        ServerMessage::RoomJoined(m) => assert_eq!(m.members, ["alice", "bob"]),
        other => panic!("unexpected reply: {:?}", other),
    }
    match common::next_message(&mut alice_rx).await {
        ServerMessage::UserJoined(m) => assert_eq!(m.user_id, "bob"),
        other => panic!("unexpected frame: {:?}", other),
    }

    router::handle_frame(&state, &carol, JOIN_P1).await;
    common::next_message(&mut alice_rx).await;
    common::next_message(&mut bob_rx).await;

    // Typing fans out to the other members only.
    let replies = router::handle_frame(&state, &alice, TYPING_P1).await;
    assert!(replies.is_empty());

    for rx in [&mut bob_rx, &mut carol_rx] {
        match common::next_message(rx).await {
            ServerMessage::Typing(ev) => {
                assert_eq!(ev.user_id, "alice");
                assert!(ev.active);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
    common::expect_silence(&mut alice_rx).await;
}

#[tokio::test]
async fn bad_frames_get_error_replies_without_killing_the_connection() {
    let state = common::build_state(common::shared_store());
    let (dave, _dave_rx) = common::connect(&state, "dave", 1);

    let oversized = "x".repeat(state.config.ws_max_frame_bytes + 1);
    let replies = router::handle_frame(&state, &dave, &oversized).await;
    match &replies[0] {
        ServerMessage::Error(e) => assert_eq!(e.error, ERR_MESSAGE_TOO_LARGE),
        other => panic!("unexpected reply: {:?}", other),
    }

    let replies = router::handle_frame(&state, &dave, "{never json").await;
    match &replies[0] {
        ServerMessage::Error(e) => assert_eq!(e.error, ERR_INVALID_JSON),
        other => panic!("unexpected reply: {:?}", other),
    }

    let replies = router::handle_frame(&state, &dave, r#"{"type":"subscribe","data":{}}"#).await;
    match &replies[0] {
        ServerMessage::Error(e) => assert_eq!(e.error, ERR_INVALID_JSON),
        other => panic!("unexpected reply: {:?}", other),
    }

    // The connection is still serviceable afterwards.
    let replies = router::handle_frame(&state, &dave, r#"{"type":"ping"}"#).await;
    assert!(matches!(replies[0], ServerMessage::Pong));
    assert_eq!(state.registry.total_connections(), 1);
}

#[tokio::test]
async fn private_user_rooms_refuse_strangers() {
    let state = common::build_state(common::shared_store());
    let (alice, _alice_rx) = common::connect(&state, "alice", 1);
    let (mallory, _mallory_rx) = common::connect(&state, "mallory", 2);

    let join_own = r#"{"type":"join_room","data":{"room":"user:alice"}}"#;
    let replies = router::handle_frame(&state, &alice, join_own).await;
    assert!(matches!(&replies[0], ServerMessage::RoomJoined(_)));

    let replies = router::handle_frame(&state, &mallory, join_own).await;
    match &replies[0] {
        ServerMessage::Error(e) => assert_eq!(e.error, ERR_JOIN_REFUSED),
        other => panic!("unexpected reply: {:?}", other),
    }
    assert_eq!(state.registry.total_rooms(), 1);
}

#[tokio::test]
async fn non_members_cannot_inject_room_traffic() {
    let state = common::build_state(common::shared_store());
    let (alice, mut alice_rx) = common::connect(&state, "alice", 1);
    let (mallory, _mallory_rx) = common::connect(&state, "mallory", 2);

    router::handle_frame(&state, &alice, JOIN_P1).await;

    // Mallory never joined, so the frame is dropped without replies.
    let replies = router::handle_frame(&state, &mallory, TYPING_P1).await;
    assert!(replies.is_empty());
    common::expect_silence(&mut alice_rx).await;
}

#[tokio::test]
async fn relay_carries_room_traffic_between_processes() {
    let store = common::shared_store();
    let state_a = common::build_state(store.clone());
    let state_b = common::build_state(store);
    let _relay_a = common::start_relay(&state_a).await;
    let _relay_b = common::start_relay(&state_b).await;

    let (bob, mut bob_rx) = common::connect(&state_b, "bob", 2);
    let replies = router::handle_frame(&state_b, &bob, JOIN_P1).await;
    match &replies[0] {
        // Rosters are per process; the relay carries events, not membership.
        ServerMessage::RoomJoined(m) => assert_eq!(m.members, ["bob"]),
        other => panic!("unexpected reply: {:?}", other),
    }

    let (alice, mut alice_rx) = common::connect(&state_a, "alice", 1);
    router::handle_frame(&state_a, &alice, JOIN_P1).await;

    // Alice's arrival crosses the relay to Bob's process.
    match common::next_message(&mut bob_rx).await {
        ServerMessage::UserJoined(m) => assert_eq!(m.user_id, "alice"),
        other => panic!("unexpected frame: {:?}", other),
    }

    // So does her typing, and her own process does not echo the relayed
    // copy back at her.
    router::handle_frame(&state_a, &alice, TYPING_P1).await;
    match common::next_message(&mut bob_rx).await {
        ServerMessage::Typing(ev) => assert_eq!(ev.user_id, "alice"),
        other => panic!("unexpected frame: {:?}", other),
    }
    common::expect_silence(&mut alice_rx).await;
}

#[tokio::test]
async fn user_broadcasts_reach_every_session_of_that_user() {
    let state = common::build_state(common::shared_store());
    let (_desk, mut desk_rx) = common::connect(&state, "alice", 1);
    let (_phone, mut phone_rx) = common::connect(&state, "alice", 2);
    let (_bob, mut bob_rx) = common::connect(&state, "bob", 3);

    let notice = ServerMessage::LockTaken(LockTakenMessage {
        doc_id: Uuid::new_v4(),
        new_holder: LockHolder {
            user_id: "support-1".to_string(),
            user_name: "Support".to_string(),
            acquired_at: Utc::now(),
        },
    });
    let delivered = state.broadcaster.broadcast_to_user("alice", &notice).await;
    assert_eq!(delivered, 2);

    for rx in [&mut desk_rx, &mut phone_rx] {
        match common::next_message(rx).await {
            ServerMessage::LockTaken(m) => assert_eq!(m.new_holder.user_id, "support-1"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }
    common::expect_silence(&mut bob_rx).await;
}

#[tokio::test]
async fn forced_disconnect_drops_the_outbound_channel() {
    let state = common::build_state(common::shared_store());
    let (alice, mut alice_rx) = common::connect(&state, "alice", 1);

    router::handle_frame(&state, &alice, JOIN_P1).await;
    let outcome = state.registry.disconnect(alice.id).expect("was connected");
    assert_eq!(outcome.rooms_left.len(), 1);

    // The writer side is gone, so a real socket task would now terminate.
    assert!(alice_rx.recv().await.is_none());
    assert_eq!(state.registry.total_connections(), 0);
}
