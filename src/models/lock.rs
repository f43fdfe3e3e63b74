use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The user holding a document lock. Stored verbatim in the shared store;
/// the display name is whatever the caller supplied at acquisition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub user_id: String,
    pub user_name: String,
    pub acquired_at: DateTime<Utc>,
}

/// Tri-state result of an acquire attempt. A conflict is an expected
/// outcome, not an error, and carries the current holder for display.
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    Acquired,
    Renewed,
    Conflict(LockHolder),
}

impl LockOutcome {
    pub fn as_str(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> LockOutcomeKind {
        match self {
            LockOutcome::Acquired => LockOutcomeKind::Acquired,
            LockOutcome::Renewed => LockOutcomeKind::Renewed,
            LockOutcome::Conflict(_) => LockOutcomeKind::Conflict,
        }
    }
}

/// Wire tag for a lock outcome, without the conflict payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LockOutcomeKind {
    Acquired,
    Renewed,
    Conflict,
}

impl LockOutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockOutcomeKind::Acquired => "acquired",
            LockOutcomeKind::Renewed => "renewed",
            LockOutcomeKind::Conflict => "conflict",
        }
    }
}

/// Snapshot of a lock as returned by `query`; no side effects.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockStatus {
    pub doc_id: Uuid,
    pub holder: Option<LockHolder>,
    /// Remaining time-to-live in seconds, present while the lock is held.
    pub ttl_secs: Option<u64>,
}

/// Request body for the privileged force-take endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForceTakeRequest {
    pub new_holder_id: String,
    pub new_holder_name: String,
}

/// Response for a force-take, echoing who was pre-empted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForceTakeResponse {
    pub doc_id: Uuid,
    pub new_holder: LockHolder,
    pub previous_holder: Option<LockHolder>,
}
