//! Failed-sync policy.
//!
//! Decides how long the engine waits after a failed fetch, and whether the
//! failure should end the loop instead.

use roomsync_core::{exponential_backoff, BACKOFF_JITTER_MAX, DEFAULT_BACKOFF};
use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

/// The policy gave up on syncing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sync escalated after {attempt} failed attempts: {reason}")]
pub struct Escalation {
    /// Which consecutive failure triggered escalation (1-based).
    pub attempt: u32,
    /// Human-readable reason.
    pub reason: String,
}

/// What to do about a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDecision {
    /// How long to wait before polling again.
    pub backoff: Duration,
    /// Stop the loop with this error instead of retrying.
    pub escalate: Option<Escalation>,
}

impl FailureDecision {
    /// Retry after `backoff`.
    pub fn retry(backoff: Duration) -> Self {
        Self {
            backoff,
            escalate: None,
        }
    }

    /// Stop the loop.
    pub fn escalate(attempt: u32, reason: impl Into<String>) -> Self {
        Self {
            backoff: Duration::ZERO,
            escalate: Some(Escalation {
                attempt,
                reason: reason.into(),
            }),
        }
    }
}

/// Hook consulted after each failed fetch.
pub trait OnFailedSync: Send + Sync {
    /// Decide what happens after the `attempt`-th consecutive failure.
    fn on_failed_sync(&self, error: &TransportError, attempt: u32) -> FailureDecision;

    /// Delay after the cursor store failed. Store failures never escalate.
    fn on_store_failed(&self, _error: &StoreError, _attempt: u32) -> Duration {
        DEFAULT_BACKOFF
    }
}

/// Always retry after the same delay. Never escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    /// Retry after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF)
    }
}

impl OnFailedSync for FixedBackoff {
    fn on_failed_sync(&self, _error: &TransportError, _attempt: u32) -> FailureDecision {
        FailureDecision::retry(self.delay)
    }

    fn on_store_failed(&self, _error: &StoreError, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Exponential backoff with jitter, optionally giving up after a number of
/// attempts or on errors that will not clear up by retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter_max: Duration,
    max_attempts: Option<u32>,
    escalate_permanent: bool,
}

impl ExponentialBackoff {
    /// Double from `base` up to `max`, with the default jitter.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter_max: BACKOFF_JITTER_MAX,
            max_attempts: None,
            escalate_permanent: false,
        }
    }

    /// Override the jitter bound (zero disables jitter).
    pub fn with_jitter(mut self, jitter_max: Duration) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Escalate once `attempts` consecutive failures have happened.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Escalate immediately on non-transient errors.
    pub fn escalate_permanent(mut self) -> Self {
        self.escalate_permanent = true;
        self
    }
}

impl OnFailedSync for ExponentialBackoff {
    fn on_failed_sync(&self, error: &TransportError, attempt: u32) -> FailureDecision {
        if self.escalate_permanent && !error.is_transient() {
            return FailureDecision::escalate(attempt, format!("permanent error: {}", error));
        }
        if let Some(limit) = self.max_attempts {
            if attempt >= limit {
                return FailureDecision::escalate(attempt, format!("giving up: {}", error));
            }
        }
        FailureDecision::retry(exponential_backoff(
            attempt,
            self.base,
            self.max,
            self.jitter_max,
        ))
    }

    fn on_store_failed(&self, _error: &StoreError, attempt: u32) -> Duration {
        exponential_backoff(attempt, self.base, self.max, self.jitter_max)
    }
}
