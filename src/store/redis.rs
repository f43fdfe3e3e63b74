use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::info;

use super::{ClaimOutcome, SharedStore, StoreEntry, StoreError, StoreSubscription};

// Each transition is one scripted round trip. The compare and the mutation
// run inside the store, so two processes can never interleave between them.

const CLAIM_SCRIPT: &str = r#"
local holder = redis.call('HGET', KEYS[1], 'holder')
if not holder then
  redis.call('HSET', KEYS[1], 'holder', ARGV[1], 'payload', ARGV[2])
  redis.call('PEXPIRE', KEYS[1], ARGV[3])
  return {'claimed', ''}
elseif holder == ARGV[1] then
  redis.call('PEXPIRE', KEYS[1], ARGV[3])
  return {'refreshed', ''}
else
  return {'held', redis.call('HGET', KEYS[1], 'payload') or ''}
end
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'holder') == ARGV[1] then
  redis.call('DEL', KEYS[1])
  return 1
end
return 0
"#;

const REFRESH_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'holder') == ARGV[1] then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

const SEIZE_SCRIPT: &str = r#"
local previous = redis.call('HGET', KEYS[1], 'payload')
redis.call('HSET', KEYS[1], 'holder', ARGV[1], 'payload', ARGV[2])
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return previous or ''
"#;

const READ_SCRIPT: &str = r#"
local payload = redis.call('HGET', KEYS[1], 'payload')
if not payload then
  return {'', -2}
end
return {payload, redis.call('PTTL', KEYS[1])}
"#;

/// Redis-backed shared store.
///
/// Commands go over a multiplexed `ConnectionManager`; every subscription
/// gets its own dedicated pub/sub connection, as the protocol requires.
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    claim: Script,
    release: Script,
    refresh: Script,
    seize: Script,
    read: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!("Connecting to shared store...");
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store URL: {}", e)))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Shared store connection established ({})", pong);

        Ok(Self {
            client,
            conn,
            claim: Script::new(CLAIM_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
            refresh: Script::new(REFRESH_SCRIPT),
            seize: Script::new(SEIZE_SCRIPT),
            read: Script::new(READ_SCRIPT),
        })
    }
}

fn store_err(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn claim(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let (status, held_payload): (String, String) = self
            .claim
            .key(key)
            .arg(holder)
            .arg(payload)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        match status.as_str() {
            "claimed" => Ok(ClaimOutcome::Claimed),
            "refreshed" => Ok(ClaimOutcome::Refreshed),
            "held" => Ok(ClaimOutcome::Held {
                payload: held_payload,
            }),
            other => Err(StoreError::Corrupt(format!(
                "unexpected claim status '{}'",
                other
            ))),
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(deleted == 1)
    }

    async fn refresh(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let refreshed: i64 = self
            .refresh
            .key(key)
            .arg(holder)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(refreshed == 1)
    }

    async fn seize(
        &self,
        key: &str,
        holder: &str,
        payload: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let previous: String = self
            .seize
            .key(key)
            .arg(holder)
            .arg(payload)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(if previous.is_empty() {
            None
        } else {
            Some(previous)
        })
    }

    async fn read(&self, key: &str) -> Result<Option<StoreEntry>, StoreError> {
        let mut conn = self.conn.clone();
        let (payload, pttl): (String, i64) = self
            .read
            .key(key)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        if payload.is_empty() {
            return Ok(None);
        }
        Ok(Some(StoreEntry {
            payload,
            ttl: (pttl >= 0).then(|| Duration::from_millis(pttl as u64)),
        }))
    }

    async fn score_put(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(key, member, score).await.map_err(store_err)?;
        Ok(())
    }

    async fn score_range(
        &self,
        key: &str,
        min_score: i64,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, i64)> = conn
            .zrangebyscore_withscores(key, min_score, "+inf")
            .await
            .map_err(store_err)?;
        Ok(members)
    }

    async fn score_trim(&self, key: &str, below_score: i64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        // "(" makes the bound exclusive: entries exactly at the cutoff stay.
        let removed: i64 = conn
            .zrembyscore(key, "-inf", format!("({}", below_score))
            .await
            .map_err(store_err)?;
        Ok(removed.max(0) as u64)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(channel, payload).await.map_err(store_err)?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<StoreSubscription, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(store_err)?;
        pubsub.subscribe(channel).await.map_err(store_err)?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() })
            .boxed();
        Ok(StoreSubscription::new(stream))
    }
}
