use futures_util::{future, stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::{RoomId, ServerMessage};
use crate::store::SharedStore;

use super::conn::{ConnHandle, ConnectionId};
use super::registry::ConnectionRegistry;
use super::relay::{RelayFrame, RelayTarget, RELAY_CHANNEL};

/// Fan-out tuning.
#[derive(Debug, Clone)]
pub struct FanoutSettings {
    /// How long one recipient may block before it is dropped.
    pub send_timeout: Duration,
    /// How many recipients are written to at once.
    pub concurrency: usize,
}

/// Delivers messages to local connections and relays them through the
/// shared store so members on other processes receive them too.
///
/// Messages are serialized once per broadcast; recipients share the frame.
/// A recipient that cannot take the frame within the send timeout is
/// disconnected without holding up anyone else.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn SharedStore>,
    origin: Uuid,
    settings: FanoutSettings,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn SharedStore>,
        origin: Uuid,
        settings: FanoutSettings,
    ) -> Self {
        Self {
            registry,
            store,
            origin,
            settings,
        }
    }

    /// Identifier other processes use to recognize our relay frames.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Deliver to every local member of `room` except `exclude`, and relay
    /// for members on other processes. Returns the local delivery count.
    pub async fn broadcast_to_room(
        &self,
        room: &RoomId,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let targets = self.registry.room_handles(room, exclude);
        let delivered = self.deliver_local(targets, frame.clone()).await;
        self.relay(RelayTarget::Room { room: room.clone() }, &frame)
            .await;
        delivered
    }

    /// Deliver to every local connection of `user_id`, and relay for the
    /// user's sessions on other processes.
    pub async fn broadcast_to_user(&self, user_id: &str, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let targets = self.registry.user_handles(user_id);
        let delivered = self.deliver_local(targets, frame.clone()).await;
        self.relay(
            RelayTarget::User {
                user_id: user_id.to_string(),
            },
            &frame,
        )
        .await;
        delivered
    }

    /// Deliver to every connection on every process. Reserved for rare
    /// account-wide events.
    pub async fn broadcast_to_all(&self, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };
        let targets = self.registry.all_handles();
        let delivered = self.deliver_local(targets, frame.clone()).await;
        self.relay(RelayTarget::All, &frame).await;
        delivered
    }

    /// Send one message to one local connection, without relaying. Returns
    /// false when the connection is gone or would not take the frame.
    pub async fn send_to_connection(&self, id: ConnectionId, message: &ServerMessage) -> bool {
        let Some(frame) = encode(message) else {
            return false;
        };
        let Some(handle) = self.registry.handle(id) else {
            return false;
        };
        self.send_one(handle, frame).await
    }

    pub(crate) async fn deliver_local(&self, targets: Vec<ConnHandle>, frame: Arc<String>) -> usize {
        stream::iter(targets)
            .map(|handle| {
                let frame = frame.clone();
                async move { self.send_one(handle, frame).await }
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .filter(|delivered| future::ready(*delivered))
            .count()
            .await
    }

    async fn send_one(&self, handle: ConnHandle, frame: Arc<String>) -> bool {
        match handle
            .sender
            .send_timeout(frame, self.settings.send_timeout)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                // One broken or unresponsive client; drop it and move on.
                warn!(
                    "Dropping connection {} of user {}: outbound send failed ({})",
                    handle.id, handle.user_id, e
                );
                let registry = self.registry.clone();
                let id = handle.id;
                tokio::spawn(async move {
                    registry.disconnect(id);
                });
                false
            }
        }
    }

    async fn relay(&self, target: RelayTarget, frame: &Arc<String>) {
        let relay_frame = RelayFrame {
            origin: self.origin,
            target,
            message: frame.as_ref().clone(),
        };
        let payload = match serde_json::to_string(&relay_frame) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode relay frame: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.publish(RELAY_CHANNEL, &payload).await {
            warn!("Relay publish failed, delivering locally only: {}", e);
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Arc<String>> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            error!("Failed to encode outbound message: {}", e);
            None
        }
    }
}
