//! Error types for currents-core

use thiserror::Error;

/// Main error type for the currents-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable key storage could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Delivery to the collection endpoint failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Event rejected at capture time
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The tracker task has exited
    #[error("tracker is not running")]
    ChannelClosed,

    /// The tracker command channel is saturated
    #[error("tracker channel full, command dropped")]
    ChannelFull,
}

/// Result type alias for currents-core
pub type Result<T> = std::result::Result<T, Error>;
