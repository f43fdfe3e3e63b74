use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{LockHolder, LockOutcome};
use crate::store::{ClaimOutcome, SharedStore, StoreError};

/// Coordinates exclusive document locks through the shared store.
///
/// Every transition (acquire, release, renew, seize) is a single atomic
/// store operation, so concurrent editors across processes always observe
/// exactly one holder per document.
pub struct LockService {
    store: Arc<dyn SharedStore>,
    ttl: Duration,
}

#[derive(Debug)]
pub enum LockError {
    Unavailable(String),
    Corrupt(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Unavailable(msg) => write!(f, "Lock store unavailable: {}", msg),
            LockError::Corrupt(msg) => write!(f, "Corrupt lock record: {}", msg),
        }
    }
}

impl std::error::Error for LockError {}

impl From<StoreError> for LockError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => LockError::Unavailable(msg),
            StoreError::Corrupt(msg) => LockError::Corrupt(msg),
        }
    }
}

fn lock_key(doc_id: &Uuid) -> String {
    format!("rt:lock:{}", doc_id)
}

fn decode_holder(payload: &str) -> Result<LockHolder, LockError> {
    serde_json::from_str(payload).map_err(|e| {
        error!("Failed to decode lock holder record: {}", e);
        LockError::Corrupt(format!("Failed to decode lock holder: {}", e))
    })
}

impl LockService {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Interval at which holders should renew, leaving two missed beats of
    /// slack before the lock expires.
    pub fn heartbeat_secs(&self) -> u64 {
        (self.ttl.as_secs() / 3).max(1)
    }

    /// Try to take the lock on a document for `user_id`.
    ///
    /// Re-acquiring a lock you already hold renews it instead of failing,
    /// and keeps the original `acquired_at`.
    pub async fn acquire(
        &self,
        doc_id: &Uuid,
        user_id: &str,
        user_name: &str,
    ) -> Result<LockOutcome, LockError> {
        let holder = LockHolder {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            acquired_at: Utc::now(),
        };
        let payload = serde_json::to_string(&holder)
            .map_err(|e| LockError::Corrupt(format!("Failed to encode lock holder: {}", e)))?;

        match self
            .store
            .claim(&lock_key(doc_id), user_id, &payload, self.ttl)
            .await?
        {
            ClaimOutcome::Claimed => {
                info!("Lock on document {} acquired by {}", doc_id, user_id);
                Ok(LockOutcome::Acquired)
            }
            ClaimOutcome::Refreshed => Ok(LockOutcome::Renewed),
            ClaimOutcome::Held { payload } => Ok(LockOutcome::Conflict(decode_holder(&payload)?)),
        }
    }

    /// Release the lock if `user_id` holds it. Returns whether anything was
    /// released; releasing a lock held by someone else is a no-op.
    pub async fn release(&self, doc_id: &Uuid, user_id: &str) -> Result<bool, LockError> {
        let released = self.store.release(&lock_key(doc_id), user_id).await?;
        if released {
            info!("Lock on document {} released by {}", doc_id, user_id);
        }
        Ok(released)
    }

    /// Renew the TTL on a lock held by `user_id`. Returns false when the
    /// lock expired or was taken over in the meantime.
    pub async fn heartbeat(&self, doc_id: &Uuid, user_id: &str) -> Result<bool, LockError> {
        Ok(self
            .store
            .refresh(&lock_key(doc_id), user_id, self.ttl)
            .await?)
    }

    /// Transfer the lock to a new holder regardless of the current one.
    /// Returns the new holder record and the displaced holder, if any.
    pub async fn force_take(
        &self,
        doc_id: &Uuid,
        new_holder_id: &str,
        new_holder_name: &str,
    ) -> Result<(LockHolder, Option<LockHolder>), LockError> {
        let holder = LockHolder {
            user_id: new_holder_id.to_string(),
            user_name: new_holder_name.to_string(),
            acquired_at: Utc::now(),
        };
        let payload = serde_json::to_string(&holder)
            .map_err(|e| LockError::Corrupt(format!("Failed to encode lock holder: {}", e)))?;

        let previous = self
            .store
            .seize(&lock_key(doc_id), new_holder_id, &payload, self.ttl)
            .await?;
        let previous = match previous {
            Some(raw) => Some(decode_holder(&raw)?),
            None => None,
        };
        info!(
            "Lock on document {} force-taken by {} (displaced: {})",
            doc_id,
            new_holder_id,
            previous
                .as_ref()
                .map(|h| h.user_id.as_str())
                .unwrap_or("none")
        );
        Ok((holder, previous))
    }

    /// Current holder and remaining TTL, or None when the document is free.
    pub async fn query(
        &self,
        doc_id: &Uuid,
    ) -> Result<Option<(LockHolder, Option<Duration>)>, LockError> {
        match self.store.read(&lock_key(doc_id)).await? {
            Some(entry) => {
                let holder = decode_holder(&entry.payload)?;
                Ok(Some((holder, entry.ttl)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(ttl: Duration) -> LockService {
        LockService::new(Arc::new(MemoryStore::new()), ttl)
    }

    #[tokio::test]
    async fn first_acquire_wins_second_conflicts() {
        let locks = service(Duration::from_secs(60));
        let doc = Uuid::new_v4();

        let first = locks.acquire(&doc, "alice", "Alice").await.unwrap();
        assert!(matches!(first, LockOutcome::Acquired));

        let second = locks.acquire(&doc, "bob", "Bob").await.unwrap();
        match second {
            LockOutcome::Conflict(holder) => {
                assert_eq!(holder.user_id, "alice");
                assert_eq!(holder.user_name, "Alice");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reacquire_renews_and_keeps_acquired_at() {
        let locks = service(Duration::from_secs(60));
        let doc = Uuid::new_v4();

        locks.acquire(&doc, "alice", "Alice").await.unwrap();
        let (holder_before, _) = locks.query(&doc).await.unwrap().unwrap();

        let again = locks.acquire(&doc, "alice", "Alice").await.unwrap();
        assert!(matches!(again, LockOutcome::Renewed));

        let (holder_after, _) = locks.query(&doc).await.unwrap().unwrap();
        assert_eq!(holder_before.acquired_at, holder_after.acquired_at);
    }

    #[tokio::test]
    async fn release_requires_owner() {
        let locks = service(Duration::from_secs(60));
        let doc = Uuid::new_v4();

        locks.acquire(&doc, "alice", "Alice").await.unwrap();
        assert!(!locks.release(&doc, "bob").await.unwrap());
        assert!(locks.query(&doc).await.unwrap().is_some());

        assert!(locks.release(&doc, "alice").await.unwrap());
        assert!(locks.query(&doc).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_lock_can_be_taken() {
        let locks = service(Duration::from_millis(20));
        let doc = Uuid::new_v4();

        locks.acquire(&doc, "alice", "Alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let outcome = locks.acquire(&doc, "bob", "Bob").await.unwrap();
        assert!(matches!(outcome, LockOutcome::Acquired));
        assert!(!locks.heartbeat(&doc, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn force_take_reports_displaced_holder() {
        let locks = service(Duration::from_secs(60));
        let doc = Uuid::new_v4();

        locks.acquire(&doc, "alice", "Alice").await.unwrap();
        let (new_holder, previous) = locks.force_take(&doc, "admin", "Admin").await.unwrap();
        assert_eq!(new_holder.user_id, "admin");
        assert_eq!(previous.unwrap().user_id, "alice");

        let (current, _) = locks.query(&doc).await.unwrap().unwrap();
        assert_eq!(current.user_id, "admin");
    }

    #[tokio::test]
    async fn force_take_on_free_document() {
        let locks = service(Duration::from_secs(60));
        let doc = Uuid::new_v4();

        let (new_holder, previous) = locks.force_take(&doc, "admin", "Admin").await.unwrap();
        assert_eq!(new_holder.user_id, "admin");
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn concurrent_acquires_elect_exactly_one_holder() {
        let locks = Arc::new(service(Duration::from_secs(60)));
        let doc = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..16 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                let user = format!("user-{}", i);
                locks.acquire(&doc, &user, &user).await.unwrap()
            }));
        }

        let mut acquired = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), LockOutcome::Acquired) {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }
}
