//! Configuration
//!
//! Client and relay settings, read from the environment (`.env` is loaded by
//! the binary through dotenvy before these are built).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0}")]
    Validation(String),
}

/// Delay between a call ending and the call state returning to idle, so the
/// UI can show the ended screen.
pub const DEFAULT_RESET_DELAY_MS: u64 = 1500;

/// Settings for one signed-in user running the call client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL (e.g., "http://localhost:3000")
    pub api_url: String,

    /// Signaling socket URL (e.g., "ws://localhost:3000/ws")
    pub signaling_url: String,

    /// Bearer token of the signed-in user
    pub token: String,

    /// Application-level user id of the signed-in user
    pub user_id: i64,

    /// Display name sent along with outgoing offers
    pub user_name: String,

    /// How long the ended screen stays before the state resets to idle
    pub reset_delay: Duration,
}

impl ClientConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let signaling_url = std::env::var("SIGNALING_URL")
            .unwrap_or_else(|_| format!("{}/ws", http_to_ws(&api_url)));
        let token = std::env::var("AUTH_TOKEN").map_err(|_| ConfigError::Missing("AUTH_TOKEN"))?;

        let raw_user_id = std::env::var("USER_ID").map_err(|_| ConfigError::Missing("USER_ID"))?;
        let user_id = raw_user_id.parse().map_err(|_| ConfigError::Invalid {
            name: "USER_ID",
            value: raw_user_id.clone(),
        })?;

        let user_name = std::env::var("USER_NAME").unwrap_or_else(|_| format!("User {}", user_id));

        let reset_delay_ms = std::env::var("CALL_RESET_DELAY_MS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_RESET_DELAY_MS);

        let config = Self {
            api_url,
            signaling_url,
            token,
            user_id,
            user_name,
            reset_delay: Duration::from_millis(reset_delay_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Validation("API URL must be http(s)".to_string()));
        }
        if !(self.signaling_url.starts_with("ws://") || self.signaling_url.starts_with("wss://")) {
            return Err(ConfigError::Validation("Signaling URL must be ws(s)".to_string()));
        }
        if self.token.is_empty() {
            return Err(ConfigError::Validation("Auth token is required".to_string()));
        }
        if self.user_id <= 0 {
            return Err(ConfigError::Validation("User id must be positive".to_string()));
        }
        Ok(())
    }
}

/// Relay server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,

    /// HS256 secret used to sign and verify bearer tokens
    pub jwt_secret: String,

    /// PostgreSQL URL for the call log; in-memory log when unset
    pub database_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "your-secret-key".to_string()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Validation("JWT secret is required".to_string()));
        }
        Ok(())
    }
}

fn http_to_ws(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}
