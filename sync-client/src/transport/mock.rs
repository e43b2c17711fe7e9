//! Mock transport for testing.
//!
//! Allows queueing responses and capturing sent requests for verification.

use super::{SyncRequest, SyncTransport, TransportError};
use async_trait::async_trait;
use roomsync_types::{Filter, SyncResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock transport for testing.
///
/// Allows queueing responses and capturing sent requests for verification.
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    responses: VecDeque<Result<SyncResponse, TransportError>>,
    requests: Vec<SyncRequest>,
    filters: Vec<Filter>,
    fail_next_sync: Option<String>,
    fail_next_create_filter: Option<String>,
    hang_when_empty: bool,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by the next `sync()` call.
    pub fn queue_response(&self, response: SyncResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push_back(Ok(response));
    }

    /// Queue an error to be returned by a `sync()` call, in order with
    /// queued responses.
    pub fn queue_error(&self, error: TransportError) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push_back(Err(error));
    }

    /// Cause the next sync() to fail with the given error, ahead of the queue.
    pub fn fail_next_sync(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_sync = Some(error.to_string());
    }

    /// Cause the next create_filter() to fail with the given error.
    pub fn fail_next_create_filter(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_create_filter = Some(error.to_string());
    }

    /// When the queue is empty, make sync() wait forever instead of
    /// returning [`TransportError::Closed`] (simulates an idle long-poll).
    pub fn hang_when_empty(&self, hang: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.hang_when_empty = hang;
    }

    /// Get all sync requests that were sent.
    pub fn requests(&self) -> Vec<SyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Get the last sync request that was sent.
    pub fn last_request(&self) -> Option<SyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.requests.last().cloned()
    }

    /// Get all filters that were uploaded.
    pub fn filters(&self) -> Vec<Filter> {
        let inner = self.inner.lock().unwrap();
        inner.filters.clone()
    }

    /// Number of responses (and queued errors) not yet consumed.
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.responses.len()
    }

    /// Clear all state (requests, queue, forced failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn create_filter(&self, filter: &Filter) -> Result<String, TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_create_filter.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.filters.push(*filter);
        Ok(format!("filter-{}", inner.filters.len()))
    }

    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request.clone());

            // Check for forced failure
            if let Some(error) = inner.fail_next_sync.take() {
                return Err(TransportError::ConnectionFailed(error));
            }

            match inner.responses.pop_front() {
                Some(next) => Some(next),
                None if inner.hang_when_empty => None,
                None => return Err(TransportError::Closed),
            }
        };

        match next {
            Some(next) => next,
            None => {
                std::future::pending::<()>().await;
                Err(TransportError::Closed)
            }
        }
    }
}
