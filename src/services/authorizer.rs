use async_trait::async_trait;
use tracing::warn;

use crate::models::RoomId;
use crate::services::auth_service::AuthedUser;

/// Decides whether a user may join a room.
///
/// Consulted on every join, never cached here. An `Err` means the decision
/// could not be made (upstream outage) and callers must treat it as a
/// refusal, not an approval.
#[async_trait]
pub trait RoomAuthorizer: Send + Sync {
    async fn can_join(&self, user: &AuthedUser, room: &RoomId) -> Result<bool, String>;
}

/// Admits everyone. Used when no app service URL is configured.
pub struct AllowAllAuthorizer;

impl AllowAllAuthorizer {
    pub fn new() -> Self {
        warn!("Room authorization not configured - allowing all room joins");
        Self
    }
}

#[async_trait]
impl RoomAuthorizer for AllowAllAuthorizer {
    async fn can_join(&self, _user: &AuthedUser, _room: &RoomId) -> Result<bool, String> {
        Ok(true)
    }
}
