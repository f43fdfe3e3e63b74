pub mod diagnostics;
pub mod health;
pub mod lock_admin;
pub mod presence_admin;
