//! Error types for robot-link

use crate::core::types::{DestinationSelector, LogicalRobotId};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// robot-link error types
///
/// Errors raised for a single datagram or a single destination are isolated
/// by their callers: none of them stops the receive loop or a fan-out send.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or foreign datagram
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operator intent rejected by the intent grammar
    #[error("Invalid intent: {0}")]
    Validation(String),

    /// Send attempted to a robot with no known address
    #[error("No address known for robot {0}")]
    AddressUnknown(LogicalRobotId),

    /// Send attempted with a sentinel destination (NONE or ERR)
    #[error("No datagram sent for destination {0}")]
    Selector(DestinationSelector),

    /// Outbound command could not be serialized
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// GUI event sink unavailable (queue full or bridge stopped)
    #[error("Event sink unavailable: {0}")]
    SinkUnavailable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error outside of datagram decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
