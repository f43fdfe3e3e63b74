use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// API response for the diagnostics endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosticsResponse {
    /// Live WebSocket connections on this process
    pub n_conn: u32,
    /// Rooms with at least one local member
    pub n_rooms: u32,
    /// Distinct users with at least one local connection
    pub n_users: u32,
    /// Local room counts broken down by scope
    pub rooms_by_scope: HashMap<String, u32>,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
