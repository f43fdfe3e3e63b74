use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::messages::{UserLeftMessage, ERR_INVALID_JSON};
use crate::models::{ErrorResponse, ServerMessage};
use crate::services::auth_service;
use crate::websocket::router;
use crate::AppState;

// Close codes a client can tell apart when the handshake fails after the
// upgrade.
const CLOSE_AUTH_REQUIRED: u16 = 4001;
const CLOSE_INVALID_TOKEN: u16 = 4002;
const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection attempt from {}", addr.ip());

    // Over-limit clients are refused before the handshake completes.
    if let Err(rejection) = app_state.registry.check_capacity(addr.ip()) {
        warn!(
            "Refusing WebSocket connection from {}: {}",
            addr.ip(),
            rejection.reason()
        );
        let status = StatusCode::SERVICE_UNAVAILABLE;
        return (status, Json(ErrorResponse::new(status, rejection.reason()))).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, query.token, addr, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    token: Option<String>,
    addr: SocketAddr,
    app_state: Arc<AppState>,
) {
    // Authenticate after the upgrade so the client receives a close frame
    // with a distinguishing code rather than a failed HTTP handshake.
    let user = match token {
        Some(token) => match auth_service::authenticate(&token) {
            Ok(user) => user,
            Err(e) => {
                warn!("WebSocket authentication failed: {}", e);
                close_with(socket, CLOSE_INVALID_TOKEN, "Invalid auth token").await;
                return;
            }
        },
        None => {
            close_with(socket, CLOSE_AUTH_REQUIRED, "Authentication required").await;
            return;
        }
    };

    // The capacity pre-check can lose a race, so registration may still
    // reject here.
    let (conn, mut outbound) = match app_state.registry.connect(user, addr.ip()) {
        Ok(pair) => pair,
        Err(rejection) => {
            close_with(socket, CLOSE_TRY_AGAIN_LATER, rejection.reason()).await;
            return;
        }
    };
    info!(
        "WebSocket connection established: {} for user {}",
        conn.id, conn.user.uid
    );

    // Split the socket into sender and receiver
    let (mut sink, mut stream) = socket.split();

    // Writer task: drain the outbound channel into the socket. Ends when
    // the registry drops this connection or the transport breaks.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink
                .send(Message::Text(frame.as_ref().clone()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Reader task: route inbound frames and queue the direct replies.
    let reader_state = app_state.clone();
    let reader_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    let replies = router::handle_frame(&reader_state, &reader_conn, &text).await;
                    for reply in replies {
                        if !reader_state
                            .broadcaster
                            .send_to_connection(reader_conn.id, &reply)
                            .await
                        {
                            return;
                        }
                    }
                }
                Message::Binary(_) => {
                    let reply =
                        ServerMessage::error(ERR_INVALID_JSON, "Binary frames are not supported");
                    if !reader_state
                        .broadcaster
                        .send_to_connection(reader_conn.id, &reply)
                        .await
                    {
                        return;
                    }
                }
                Message::Close(_) => return,
                _ => {}
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Remove the connection and tell each room its user left.
    if let Some(outcome) = app_state.registry.disconnect(conn.id) {
        for room in outcome.rooms_left {
            let announce = ServerMessage::UserLeft(UserLeftMessage {
                room: room.clone(),
                user_id: outcome.user_id.clone(),
            });
            app_state
                .broadcaster
                .broadcast_to_room(&room, &announce, None)
                .await;
        }
    }
    info!("WebSocket connection terminated: {}", conn.id);
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: Cow::from(reason),
        })))
        .await;
}
