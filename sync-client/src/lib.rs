//! # sync-client
//!
//! Incremental room sync for roomsync.
//!
//! This is the library that applications embed to keep a local view of
//! their rooms up to date from a long-polling sync endpoint.
//!
//! ## Features
//!
//! - **Sync Engine**: long-running poll loop with pluggable failure policy
//! - **Response Processor**: ordered state/timeline emission per room
//! - **Cursor Store**: resumable `since` token (memory or JSON file)
//! - **Bounded Event Sink**: explicit block/drop policy when consumers lag
//! - **Pure State Machine**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use roomsync_client::{FileCursorStore, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::default();
//! let (sink, mut events) = config.event_channel();
//! let store = FileCursorStore::open("cursor.json").await?;
//! let mut engine = SyncEngine::new(config, transport, store, sink);
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         handle(event);
//!     }
//! });
//! engine.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod policy;
pub mod processor;
pub mod sink;
pub mod store;
pub mod transport;

pub use config::{BackoffStrategy, SyncConfig};
pub use diagnostics::{DiagnosticRecord, Diagnostics, RecordingDiagnostics, TracingDiagnostics};
pub use engine::{EngineError, IterationError, StopHandle, SyncEngine};
pub use policy::{Escalation, ExponentialBackoff, FailureDecision, FixedBackoff, OnFailedSync};
pub use processor::{
    FaultLocation, Partition, ProcessReport, ProcessingError, ResponseProcessor, Section,
};
pub use sink::{event_channel, ChannelSink, EventSink, SinkError, SinkPolicy, DEFAULT_SINK_CAPACITY};
pub use store::{CursorStore, FileCursorStore, MemoryCursorStore, StoreError};
pub use transport::{
    MockTransport, SyncRequest, SyncTransport, TransportError, DEFAULT_SYNC_TIMEOUT,
};
