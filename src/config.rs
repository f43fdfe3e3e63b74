use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Cloud service identifiers
    #[serde(default = "default_service_name")]
    pub cloud_service_name: String,
    pub cloud_pod: Option<String>,

    /// JWT secret key
    pub cloud_auth_jwt_secret: Option<String>,

    /// Base URL of the application service that answers room access checks
    pub app_service_url: Option<String>,

    /// Redis URL backing locks, presence and the cross-process relay
    pub redis_url: Option<String>,

    /// Largest inbound WebSocket text frame accepted, in bytes
    #[serde(default = "default_ws_max_frame_bytes")]
    pub ws_max_frame_bytes: usize,

    /// Total WebSocket connections this process will hold
    #[serde(default = "default_ws_max_connections")]
    pub ws_max_connections: usize,

    /// WebSocket connections allowed from a single IP address
    #[serde(default = "default_ws_max_connections_per_ip")]
    pub ws_max_connections_per_ip: usize,

    /// Frames queued per connection before sends start timing out
    #[serde(default = "default_ws_outbound_buffer")]
    pub ws_outbound_buffer: usize,

    /// How long a fan-out waits on one slow connection, in milliseconds
    #[serde(default = "default_ws_send_timeout_ms")]
    pub ws_send_timeout_ms: u64,

    /// Connections written to concurrently during a fan-out
    #[serde(default = "default_ws_fanout_concurrency")]
    pub ws_fanout_concurrency: usize,

    /// Document lock lifetime between heartbeats, in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// How far back a presence heartbeat still counts, in seconds
    #[serde(default = "default_presence_window_secs")]
    pub presence_window_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            cloud_service_name: default_service_name(),
            cloud_pod: None,
            cloud_auth_jwt_secret: None,
            app_service_url: None,
            redis_url: None,
            ws_max_frame_bytes: default_ws_max_frame_bytes(),
            ws_max_connections: default_ws_max_connections(),
            ws_max_connections_per_ip: default_ws_max_connections_per_ip(),
            ws_outbound_buffer: default_ws_outbound_buffer(),
            ws_send_timeout_ms: default_ws_send_timeout_ms(),
            ws_fanout_concurrency: default_ws_fanout_concurrency(),
            lock_ttl_secs: default_lock_ttl_secs(),
            presence_window_secs: default_presence_window_secs(),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Install the loaded configuration for the lifetime of the process. Later
/// calls are ignored, which keeps tests that race on it harmless.
pub fn init_config(config: Config) {
    let _ = CONFIG.set(config);
}

/// The process-wide configuration, defaults when `init_config` never ran.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "tasklane-realtime".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_ws_max_frame_bytes() -> usize {
    1_048_576
}

fn default_ws_max_connections() -> usize {
    10_000
}

fn default_ws_max_connections_per_ip() -> usize {
    100
}

fn default_ws_outbound_buffer() -> usize {
    256
}

fn default_ws_send_timeout_ms() -> u64 {
    3_000
}

fn default_ws_fanout_concurrency() -> usize {
    64
}

fn default_lock_ttl_secs() -> u64 {
    300
}

fn default_presence_window_secs() -> u64 {
    60
}
