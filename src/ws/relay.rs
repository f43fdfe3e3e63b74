use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::RoomId;
use crate::store::{SharedStore, StoreError};

use super::broadcaster::Broadcaster;
use super::registry::ConnectionRegistry;

/// Pub/sub channel carrying broadcast frames between processes.
pub const RELAY_CHANNEL: &str = "rt:relay";

/// One broadcast forwarded through the shared store.
///
/// `message` is the already-serialized wire frame; receiving processes pass
/// it straight to their local sockets.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayFrame {
    pub origin: Uuid,
    pub target: RelayTarget,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelayTarget {
    Room { room: RoomId },
    User { user_id: String },
    All,
}

/// Background task that applies relay frames from other processes to the
/// local connections. Frames we published ourselves are skipped; relayed
/// frames are never re-published, so a frame crosses the store once.
pub struct RelayListener {
    task: JoinHandle<()>,
}

impl RelayListener {
    pub async fn start(
        store: Arc<dyn SharedStore>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
        origin: Uuid,
    ) -> Result<Self, StoreError> {
        let mut subscription = store.subscribe(RELAY_CHANNEL).await?;
        let task = tokio::spawn(async move {
            info!("Relay listener started");
            while let Some(payload) = subscription.next().await {
                let frame: RelayFrame = match serde_json::from_str(&payload) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Ignoring malformed relay frame: {}", e);
                        continue;
                    }
                };
                if frame.origin == origin {
                    continue;
                }
                let targets = match &frame.target {
                    RelayTarget::Room { room } => registry.room_handles(room, None),
                    RelayTarget::User { user_id } => registry.user_handles(user_id),
                    RelayTarget::All => registry.all_handles(),
                };
                if targets.is_empty() {
                    continue;
                }
                let delivered = broadcaster
                    .deliver_local(targets, Arc::new(frame.message))
                    .await;
                debug!("Relay frame delivered to {} local connections", delivered);
            }
            warn!("Relay subscription ended");
        });
        Ok(Self { task })
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RelayListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
