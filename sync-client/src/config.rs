//! Engine configuration.

use roomsync_core::DEFAULT_BACKOFF;
use roomsync_types::{Event, Filter, DEFAULT_TIMELINE_LIMIT};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::policy::{ExponentialBackoff, FixedBackoff, OnFailedSync};
use crate::sink::{event_channel, ChannelSink, SinkPolicy, DEFAULT_SINK_CAPACITY};
use crate::transport::DEFAULT_SYNC_TIMEOUT;

/// How long to wait after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Always the same delay.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Doubling delay with jitter.
    Exponential {
        /// First delay.
        base: Duration,
        /// Upper bound before jitter.
        max: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Fixed {
            delay: DEFAULT_BACKOFF,
        }
    }
}

/// Configuration for [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum timeline events per room per response.
    pub timeline_limit: u32,
    /// Long-poll timeout sent with each sync request.
    pub timeout: Duration,
    /// Event sink capacity.
    pub sink_capacity: usize,
    /// What to do when the sink is full.
    pub sink_policy: SinkPolicy,
    /// Failed-sync backoff.
    pub backoff: BackoffStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeline_limit: DEFAULT_TIMELINE_LIMIT,
            timeout: DEFAULT_SYNC_TIMEOUT,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            sink_policy: SinkPolicy::default(),
            backoff: BackoffStrategy::default(),
        }
    }
}

impl SyncConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeline limit used in the uploaded filter.
    pub fn with_timeline_limit(mut self, limit: u32) -> Self {
        self.timeline_limit = limit;
        self
    }

    /// Set the long-poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set sink capacity and full-queue policy.
    pub fn with_sink(mut self, capacity: usize, policy: SinkPolicy) -> Self {
        self.sink_capacity = capacity;
        self.sink_policy = policy;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// The filter uploaded when none is stored.
    pub fn filter(&self) -> Filter {
        Filter::with_timeline_limit(self.timeline_limit)
    }

    /// Build the failure policy for the configured strategy.
    pub fn failure_policy(&self) -> Box<dyn OnFailedSync> {
        match self.backoff {
            BackoffStrategy::Fixed { delay } => Box::new(FixedBackoff::new(delay)),
            BackoffStrategy::Exponential { base, max } => {
                Box::new(ExponentialBackoff::new(base, max))
            }
        }
    }

    /// Create the bounded event channel for this configuration.
    pub fn event_channel(&self) -> (ChannelSink, mpsc::Receiver<Event>) {
        event_channel(self.sink_capacity, self.sink_policy)
    }
}
