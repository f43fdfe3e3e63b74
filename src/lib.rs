pub mod auth;
pub mod clients;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod websocket;
pub mod ws;

pub use state::AppState;
