//! Error types for clubsync operations

use thiserror::Error;

/// Main error type for clubsync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Action rejected: {message}")]
    ActionRejected { message: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid topic: {topic}")]
    InvalidTopic { topic: String },

    #[error("Unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Result type alias for clubsync operations
pub type Result<T> = std::result::Result<T, SyncError>;
