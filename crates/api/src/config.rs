//! Application configuration

use std::env;
use std::time::Duration;

/// Default chat retention window: 7 days
pub const DEFAULT_CHAT_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub log_format: LogFormat,

    // Database (the chat log falls back to memory when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub internal_api_token: String,

    // Rooms
    pub chat_retention: Duration,
    pub alarm_poll_interval: Duration,
    pub room_idle_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("pretty") | Err(_) => LogFormat::Pretty,
                Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT must be 'json' or 'pretty'")),
            },

            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            internal_api_token: {
                let token = env::var("INTERNAL_API_TOKEN")
                    .map_err(|_| ConfigError::Missing("INTERNAL_API_TOKEN"))?;
                if token.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "INTERNAL_API_TOKEN must be at least 32 characters",
                    ));
                }
                token
            },

            // Rooms
            chat_retention: Duration::from_secs(
                env::var("CHAT_RETENTION_SECS")
                    .unwrap_or_else(|_| DEFAULT_CHAT_RETENTION_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_CHAT_RETENTION_SECS),
            ),
            alarm_poll_interval: Duration::from_millis(
                env::var("ALARM_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
            ),
            room_idle_timeout: Duration::from_secs(
                env::var("ROOM_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            ),
            max_frame_bytes: env::var("MAX_FRAME_BYTES")
                .unwrap_or_else(|_| "16384".to_string())
                .parse()
                .unwrap_or(16384),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
