use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::models::{PresenceMember, RoomId};
use crate::store::{SharedStore, StoreError};

/// Tracks which users were recently active in a room.
///
/// Each heartbeat upserts the user with a millisecond timestamp; queries
/// return everyone seen within the window and opportunistically drop the
/// rest, so the sets stay bounded without a background sweeper.
pub struct PresenceService {
    store: Arc<dyn SharedStore>,
    window: Duration,
}

fn presence_key(room: &RoomId) -> String {
    format!("rt:presence:{}", room)
}

impl PresenceService {
    pub fn new(store: Arc<dyn SharedStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    /// Record that `user_id` is active in `room` right now.
    pub async fn heartbeat(&self, room: &RoomId, user_id: &str) -> Result<(), StoreError> {
        let now_ms = Utc::now().timestamp_millis();
        self.store
            .score_put(&presence_key(room), user_id, now_ms)
            .await
    }

    /// Members seen within the window, oldest first. Entries that fell out
    /// of the window are pruned as a side effect.
    pub async fn query(
        &self,
        room: &RoomId,
        window: Option<Duration>,
    ) -> Result<Vec<PresenceMember>, StoreError> {
        let window = window.unwrap_or(self.window);
        let cutoff_ms = Utc::now().timestamp_millis() - window.as_millis() as i64;
        let key = presence_key(room);

        self.store.score_trim(&key, cutoff_ms).await?;
        let members = self.store.score_range(&key, cutoff_ms).await?;
        Ok(members
            .into_iter()
            .map(|(user_id, last_seen_ms)| PresenceMember {
                user_id,
                last_seen_ms,
            })
            .collect())
    }

    /// Drop every member last seen before the window. Returns how many
    /// entries were removed.
    pub async fn cleanup(&self, room: &RoomId) -> Result<u64, StoreError> {
        let cutoff_ms = Utc::now().timestamp_millis() - self.window.as_millis() as i64;
        let removed = self.store.score_trim(&presence_key(room), cutoff_ms).await?;
        if removed > 0 {
            info!("Pruned {} stale presence entries from {}", removed, room);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(window: Duration) -> PresenceService {
        PresenceService::new(Arc::new(MemoryStore::new()), window)
    }

    fn room() -> RoomId {
        RoomId::parse("task:42").unwrap()
    }

    #[tokio::test]
    async fn heartbeat_makes_user_visible() {
        let presence = service(Duration::from_secs(60));
        presence.heartbeat(&room(), "alice").await.unwrap();

        let members = presence.query(&room(), None).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "alice");
    }

    #[tokio::test]
    async fn repeated_heartbeats_keep_one_entry() {
        let presence = service(Duration::from_secs(60));
        presence.heartbeat(&room(), "alice").await.unwrap();
        presence.heartbeat(&room(), "alice").await.unwrap();

        let members = presence.query(&room(), None).await.unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn stale_members_drop_out_of_queries() {
        let presence = service(Duration::from_millis(30));
        presence.heartbeat(&room(), "alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        presence.heartbeat(&room(), "bob").await.unwrap();

        let members = presence.query(&room(), None).await.unwrap();
        let ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["bob"]);
    }

    #[tokio::test]
    async fn window_override_widens_the_view() {
        let presence = service(Duration::from_millis(30));
        presence.heartbeat(&room(), "alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let wide = presence
            .query(&room(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(wide.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_reports_removed_count() {
        let presence = service(Duration::from_millis(30));
        presence.heartbeat(&room(), "alice").await.unwrap();
        presence.heartbeat(&room(), "bob").await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        presence.heartbeat(&room(), "carol").await.unwrap();

        let removed = presence.cleanup(&room()).await.unwrap();
        assert_eq!(removed, 2);

        let members = presence.query(&room(), None).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "carol");
    }
}
