use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::fmt;
use std::time::Duration;

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Outcome of an atomic claim on a keyed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The entry was absent and now belongs to the claimant.
    Claimed,
    /// The claimant already owned the entry; its TTL was extended and the
    /// stored payload left untouched.
    Refreshed,
    /// Another owner holds the entry; their payload is returned.
    Held { payload: String },
}

/// An entry read back from the store, with its remaining lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub payload: String,
    pub ttl: Option<Duration>,
}

/// A live subscription to one of the store's broadcast channels.
pub struct StoreSubscription {
    stream: BoxStream<'static, String>,
}

impl StoreSubscription {
    pub fn new(stream: BoxStream<'static, String>) -> Self {
        Self { stream }
    }

    /// Next published payload, or `None` once the channel is gone.
    pub async fn next(&mut self) -> Option<String> {
        self.stream.next().await
    }
}

/// The external key-value store backing lock ownership, presence and the
/// cross-process broadcast relay.
///
/// Every mutating operation is a single atomic round trip: implementations
/// must never decompose a compare into a separate read and write, because
/// two processes racing between those steps is exactly what this seam
/// exists to prevent.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Claim `key` for `holder`, storing `payload` on first claim.
    async fn claim(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Delete `key`, but only if `holder` owns it. Returns whether it did.
    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError>;

    /// Extend the TTL of `key`, but only if `holder` owns it.
    async fn refresh(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Unconditionally hand `key` to `holder`, returning the payload of the
    /// previous owner when there was one.
    async fn seize(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Read `key` without side effects.
    async fn read(&self, key: &str) -> Result<Option<StoreEntry>, StoreError>;

    /// Upsert `member` into the time-ordered set at `key`.
    async fn score_put(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError>;

    /// Members of the set at `key` with a score at or above `min_score`,
    /// ordered by ascending score.
    async fn score_range(&self, key: &str, min_score: i64)
        -> Result<Vec<(String, i64)>, StoreError>;

    /// Remove members with a score strictly below `below_score`; returns
    /// how many were removed.
    async fn score_trim(&self, key: &str, below_score: i64) -> Result<u64, StoreError>;

    /// Publish `payload` on a broadcast channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError>;

    /// Subscribe to a broadcast channel.
    async fn subscribe(&self, channel: &str) -> Result<StoreSubscription, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached, or the round trip failed. Callers
    /// must treat the operation as failed, never as applied.
    Unavailable(String),
    /// The store answered with something this crate cannot interpret.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "Shared store unavailable: {}", e),
            StoreError::Corrupt(e) => write!(f, "Shared store returned bad data: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}
