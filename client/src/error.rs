//! Unified error handling for the client runtime.

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] pitstop_engine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request {method} {endpoint} failed with status {status}")]
    Status {
        method: String,
        endpoint: String,
        status: u16,
        body: Option<String>,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Realtime channel is not connected")]
    NotConnected,

    #[error("Realtime channel error: {0}")]
    Channel(String),

    #[error("Queue has been disposed")]
    Disposed,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
