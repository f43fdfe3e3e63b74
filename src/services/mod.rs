pub mod auth_service;
pub mod authorizer;
pub mod lock_service;
pub mod presence_service;
