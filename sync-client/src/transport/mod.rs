//! Transport abstraction for roomsync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! mechanism used to reach the remote service (HTTP in production, mock for
//! testing). The HTTP client itself, authentication and session setup live
//! outside this crate.
//!
//! # Design
//!
//! The transport trait is async and request-oriented:
//! - `create_filter()` uploads the sync filter and returns its id
//! - `sync()` performs one (long-poll) sync request
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.queue_response(SyncResponse::new("s1"));
//! let response = transport.sync(&SyncRequest::initial("filter")).await?;
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use roomsync_types::{Filter, SyncResponse};
use std::time::Duration;
use thiserror::Error;

/// Default long-poll timeout sent with each sync request.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote service could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote service answered with an error status.
    #[error("http error {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error body or reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The transport has no more responses to give.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Whether the error is likely to clear up on retry.
    ///
    /// Client errors (4xx other than 429) and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::Closed => false,
        }
    }
}

/// One sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Resumption token; `None` on the first (bootstrap) sync.
    pub since: Option<String>,
    /// Server-side filter id.
    pub filter_id: String,
    /// Long-poll timeout.
    pub timeout: Duration,
}

impl SyncRequest {
    /// Create a request with the default timeout.
    pub fn new(since: Option<&str>, filter_id: &str) -> Self {
        Self {
            since: since.map(str::to_string),
            filter_id: filter_id.to_string(),
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }

    /// Create a bootstrap request (no `since`).
    pub fn initial(filter_id: &str) -> Self {
        Self::new(None, filter_id)
    }

    /// Override the long-poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport trait for reaching the remote sync service.
///
/// Implementations handle the underlying request mechanism
/// (HTTP client, recorded responses, mock, etc).
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Upload `filter` and return the id the server assigned to it.
    async fn create_filter(&self, filter: &Filter) -> Result<String, TransportError>;

    /// Perform one sync request.
    ///
    /// Blocks until the server answers or the long-poll timeout elapses.
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError>;
}
