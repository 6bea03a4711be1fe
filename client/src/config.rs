//! Configuration management for the client runtime.

use pitstop_engine::{EndpointFallback, DEFAULT_MAX_PRIMARY_FAILURES};
use std::env;
use std::time::Duration;

/// Default SQLite database for the persisted queue.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pitstop.db?mode=rwc";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API
    pub api_url: String,
    /// Bearer token for authenticated requests
    pub auth_token: Option<String>,
    /// SQLite URL for the key-value store
    pub database_url: String,
    /// Timeout applied to every replayed request
    pub request_timeout: Duration,
    /// Primary real-time endpoint
    pub socket_url: Option<String>,
    /// Secondary real-time endpoint
    pub socket_fallback_url: Option<String>,
    /// Consecutive primary failures before switching to the secondary
    pub socket_max_failures: u32,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("PITSTOP_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;

        let auth_token = env::var("PITSTOP_AUTH_TOKEN").ok();

        let database_url =
            env::var("PITSTOP_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let timeout_secs = env::var("PITSTOP_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUEST_TIMEOUT_SECS.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let socket_url = env::var("PITSTOP_SOCKET_URL").ok();
        let socket_fallback_url = env::var("PITSTOP_SOCKET_FALLBACK_URL").ok();

        let socket_max_failures = env::var("PITSTOP_SOCKET_MAX_FAILURES")
            .unwrap_or_else(|_| DEFAULT_MAX_PRIMARY_FAILURES.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidMaxFailures)?;

        Ok(Self {
            api_url,
            auth_token,
            database_url,
            request_timeout: Duration::from_secs(timeout_secs),
            socket_url,
            socket_fallback_url,
            socket_max_failures,
        })
    }

    /// Endpoint selector for the real-time channel, if one is configured.
    pub fn socket_fallback(&self) -> Option<EndpointFallback> {
        self.socket_url.as_ref().map(|primary| {
            EndpointFallback::new(
                primary.clone(),
                self.socket_fallback_url.clone(),
                self.socket_max_failures,
            )
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PITSTOP_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("Invalid PITSTOP_REQUEST_TIMEOUT_SECS value")]
    InvalidTimeout,

    #[error("Invalid PITSTOP_SOCKET_MAX_FAILURES value")]
    InvalidMaxFailures,
}
