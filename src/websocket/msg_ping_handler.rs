use tracing::debug;

use crate::models::ServerMessage;
use crate::ws::Connection;

/// Handle a ping frame
pub fn handle_ping_message(conn: &Connection) -> Vec<ServerMessage> {
    debug!("Ping from connection {}", conn.id);
    vec![ServerMessage::Pong]
}
