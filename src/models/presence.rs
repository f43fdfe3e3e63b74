use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One user's presence in a room, as kept in the store's time-ordered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMember {
    pub user_id: String,
    /// Last heartbeat, epoch milliseconds.
    pub last_seen_ms: i64,
}

/// Response for the scheduler-driven presence cleanup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceCleanupResponse {
    pub room: String,
    pub removed: u64,
}
