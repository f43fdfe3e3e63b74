pub mod handler;
pub mod msg_lock_handler;
pub mod msg_ping_handler;
pub mod msg_presence_handler;
pub mod msg_room_handler;
pub mod msg_update_handler;
pub mod router;
