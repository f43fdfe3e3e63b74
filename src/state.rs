use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::services::authorizer::RoomAuthorizer;
use crate::services::lock_service::LockService;
use crate::services::presence_service::PresenceService;
use crate::store::SharedStore;
use crate::ws::{Broadcaster, ConnectionRegistry, FanoutSettings, RegistryLimits};

/// Everything the handlers share, wired once at startup.
///
/// Nothing in here is a process global; tests build as many isolated
/// instances as they like.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SharedStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub locks: Arc<LockService>,
    pub presence: Arc<PresenceService>,
    pub authorizer: Arc<dyn RoomAuthorizer>,
}

impl AppState {
    /// Wire the full service graph over the given store and authorizer.
    pub fn build(
        config: Config,
        store: Arc<dyn SharedStore>,
        authorizer: Arc<dyn RoomAuthorizer>,
    ) -> Arc<Self> {
        let origin = Uuid::new_v4();
        let registry = Arc::new(ConnectionRegistry::new(RegistryLimits {
            max_connections: config.ws_max_connections,
            max_connections_per_ip: config.ws_max_connections_per_ip,
            outbound_buffer: config.ws_outbound_buffer,
        }));
        let broadcaster = Arc::new(Broadcaster::new(
            registry.clone(),
            store.clone(),
            origin,
            FanoutSettings {
                send_timeout: Duration::from_millis(config.ws_send_timeout_ms),
                concurrency: config.ws_fanout_concurrency,
            },
        ));
        let locks = Arc::new(LockService::new(
            store.clone(),
            Duration::from_secs(config.lock_ttl_secs),
        ));
        let presence = Arc::new(PresenceService::new(
            store.clone(),
            Duration::from_secs(config.presence_window_secs),
        ));
        Arc::new(Self {
            config,
            store,
            registry,
            broadcaster,
            locks,
            presence,
            authorizer,
        })
    }
}
