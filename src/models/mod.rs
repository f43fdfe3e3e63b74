pub mod diagnostics;
pub mod error;
pub mod health;
pub mod lock;
pub mod messages;
pub mod presence;
pub mod room;

pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use lock::*;
pub use messages::*;
pub use presence::*;
pub use room::*;
