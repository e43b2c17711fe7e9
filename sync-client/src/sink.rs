//! Event sink: where processed events go.
//!
//! The processor hands each event to an [`EventSink`] as soon as it is
//! ready. The default sink is a bounded channel whose full-queue behavior
//! is chosen explicitly by [`SinkPolicy`]:
//!
//! - [`SinkPolicy::Block`] waits for the consumer to drain. This stalls the
//!   poll loop (and cursor advancement) while the consumer is behind, which
//!   is the intended backpressure.
//! - [`SinkPolicy::DropNewest`] discards the event with a warning and keeps
//!   going.

use async_trait::async_trait;
use roomsync_types::Event;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Default channel capacity.
pub const DEFAULT_SINK_CAPACITY: usize = 64;

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer side is gone.
    #[error("event sink closed")]
    Closed,

    /// The sink refused the event.
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// What to do when the sink is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkPolicy {
    /// Wait until the consumer makes room.
    #[default]
    Block,
    /// Drop the event being sent.
    DropNewest,
}

/// Destination for processed events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    ///
    /// May wait (backpressure). An error aborts processing of the current
    /// response.
    async fn send(&self, event: Event) -> Result<(), SinkError>;
}

/// Bounded channel sink.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
    policy: SinkPolicy,
    dropped: AtomicU64,
}

/// Create a bounded event channel.
///
/// A capacity of 0 is raised to 1.
pub fn event_channel(capacity: usize, policy: SinkPolicy) -> (ChannelSink, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = ChannelSink {
        tx,
        policy,
        dropped: AtomicU64::new(0),
    };
    (sink, rx)
}

impl ChannelSink {
    /// The configured full-queue policy.
    pub fn policy(&self) -> SinkPolicy {
        self.policy
    }

    /// Number of events dropped under [`SinkPolicy::DropNewest`].
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: Event) -> Result<(), SinkError> {
        match self.policy {
            SinkPolicy::Block => self.tx.send(event).await.map_err(|_| SinkError::Closed),
            SinkPolicy::DropNewest => match self.tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(event)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        event_type = %event.event_type,
                        dropped,
                        "Event sink full, dropping event"
                    );
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
            },
        }
    }
}
