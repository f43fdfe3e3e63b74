pub mod broadcaster;
pub mod conn;
pub mod registry;
pub mod relay;

pub use broadcaster::{Broadcaster, FanoutSettings};
pub use conn::{Connection, ConnectionId};
pub use registry::{ConnectRejection, ConnectionRegistry, RegistryLimits};
pub use relay::{RelayFrame, RelayListener, RelayTarget, RELAY_CHANNEL};
