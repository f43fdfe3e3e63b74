use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{ClaimOutcome, SharedStore, StoreEntry, StoreError, StoreSubscription};

const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    holder: String,
    payload: String,
    expires_at: Option<Instant>,
}

/// In-process stand-in for the shared store.
///
/// Used by the test suites and as the single-process fallback when no store
/// URL is configured. Atomicity holds trivially: every operation runs its
/// whole compare-and-mutate under one mutex. Expiry is evaluated lazily on
/// access, which matches how callers observe TTLs through the trait.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    scores: Mutex<HashMap<String, BTreeMap<String, i64>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            scores: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn drop_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        let expired = entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map_or(false, |at| at <= Instant::now());
        if expired {
            entries.remove(key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn claim(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        holder: holder.to_string(),
                        payload: payload.to_string(),
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
                Ok(ClaimOutcome::Claimed)
            }
            Some(entry) if entry.holder == holder => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(ClaimOutcome::Refreshed)
            }
            Some(entry) => Ok(ClaimOutcome::Held {
                payload: entry.payload.clone(),
            }),
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        let owned = entries.get(key).map_or(false, |e| e.holder == holder);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    async fn refresh(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(entry) if entry.holder == holder => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn seize(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        let previous = entries.insert(
            key.to_string(),
            Entry {
                holder: holder.to_string(),
                payload: payload.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(previous.map(|e| e.payload))
    }

    async fn read(&self, key: &str) -> Result<Option<StoreEntry>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        Self::drop_if_expired(&mut entries, key);
        Ok(entries.get(key).map(|e| StoreEntry {
            payload: e.payload.clone(),
            ttl: e
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now())),
        }))
    }

    async fn score_put(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut scores = self.scores.lock().unwrap();
        scores
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn score_range(
        &self,
        key: &str,
        min_score: i64,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let scores = self.scores.lock().unwrap();
        let mut members: Vec<(String, i64)> = scores
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(_, score)| **score >= min_score)
                    .map(|(member, score)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(members)
    }

    async fn score_trim(&self, key: &str, below_score: i64) -> Result<u64, StoreError> {
        let mut scores = self.scores.lock().unwrap();
        let Some(set) = scores.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|_, score| *score >= below_score);
        let removed = (before - set.len()) as u64;
        if set.is_empty() {
            scores.remove(key);
        }
        Ok(removed)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let sender = {
            let mut channels = self.channels.lock().unwrap();
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .clone()
        };
        // A send with no live subscribers is not a failure.
        let _ = sender.send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<StoreSubscription, StoreError> {
        let receiver = {
            let mut channels = self.channels.lock().unwrap();
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };
        let stream = BroadcastStream::new(receiver)
            .filter_map(|result| async move { result.ok() })
            .boxed();
        Ok(StoreSubscription::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_is_first_wins_and_renewable_by_the_owner() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);

        let first = store.claim("k", "alice", "a", ttl).await.unwrap();
        assert_eq!(first, ClaimOutcome::Claimed);

        let again = store.claim("k", "alice", "a2", ttl).await.unwrap();
        assert_eq!(again, ClaimOutcome::Refreshed);

        let other = store.claim("k", "bob", "b", ttl).await.unwrap();
        // Refresh must not overwrite the original payload.
        assert_eq!(other, ClaimOutcome::Held { payload: "a".into() });
    }

    #[tokio::test]
    async fn release_only_succeeds_for_the_owner() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.claim("k", "alice", "a", ttl).await.unwrap();

        assert!(!store.release("k", "bob").await.unwrap());
        assert!(store.read("k").await.unwrap().is_some());

        assert!(store.release("k", "alice").await.unwrap());
        assert!(store.read("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_behave_as_absent() {
        let store = MemoryStore::new();
        store
            .claim("k", "alice", "a", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.read("k").await.unwrap().is_none());
        assert!(!store.refresh("k", "alice", Duration::from_secs(5)).await.unwrap());
        let outcome = store
            .claim("k", "bob", "b", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn seize_replaces_any_owner_and_returns_the_old_payload() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.claim("k", "alice", "a", ttl).await.unwrap();

        let previous = store.seize("k", "bob", "b", ttl).await.unwrap();
        assert_eq!(previous, Some("a".to_string()));
        assert_eq!(store.read("k").await.unwrap().unwrap().payload, "b");

        let none = store.seize("fresh", "bob", "b", ttl).await.unwrap();
        assert_eq!(none, None);
    }

    #[tokio::test]
    async fn score_sets_support_range_and_trim() {
        let store = MemoryStore::new();
        store.score_put("s", "u1", 100).await.unwrap();
        store.score_put("s", "u2", 200).await.unwrap();
        store.score_put("s", "u3", 300).await.unwrap();
        store.score_put("s", "u1", 250).await.unwrap();

        let range = store.score_range("s", 200).await.unwrap();
        assert_eq!(
            range,
            vec![
                ("u2".to_string(), 200),
                ("u1".to_string(), 250),
                ("u3".to_string(), 300)
            ]
        );

        let removed = store.score_trim("s", 250).await.unwrap();
        assert_eq!(removed, 1);
        let rest = store.score_range("s", 0).await.unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[tokio::test]
    async fn publish_reaches_live_subscribers() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("ch").await.unwrap();
        store.publish("ch", "hello").await.unwrap();
        assert_eq!(sub.next().await, Some("hello".to_string()));
    }
}
