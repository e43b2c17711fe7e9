//! Error types for roomsync wire types.

use thiserror::Error;

/// Errors that can occur while decoding or encoding wire types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// A sync response body could not be decoded
    #[error("invalid sync response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    /// A raw event payload is not syntactically valid JSON
    #[error("invalid raw event: {0}")]
    InvalidRawEvent(#[source] serde_json::Error),

    /// JSON encoding failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}
