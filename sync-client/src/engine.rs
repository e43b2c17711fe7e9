//! SyncEngine - the long-running poll loop.
//!
//! The engine drives the pure [`SyncPhase`] state machine from sync-core and
//! interprets its actions with real I/O:
//!
//! ```text
//! CursorStore ─┐
//!              ├─> fetch ──> ResponseProcessor ──> EventSink
//! Transport ───┘                   │
//!                                  └─> save next_batch
//! ```
//!
//! Every iteration either fully succeeds (response processed, cursor
//! persisted) or leaves the stored cursor where it was, so the next
//! iteration replays the same window.
//!
//! # Example
//!
//! ```ignore
//! let config = SyncConfig::default();
//! let (sink, mut events) = config.event_channel();
//! let mut engine = SyncEngine::new(config, transport, FileCursorStore::open(path).await?, sink);
//! let stop = engine.stop_handle();
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.event_type);
//!     }
//! });
//! engine.run().await?;
//! ```

use roomsync_core::{Action, PhaseEvent, SyncPhase};
use roomsync_types::{SyncCursor, SyncResponse};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::SyncConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::policy::{Escalation, OnFailedSync};
use crate::processor::{ProcessReport, ProcessingError, ResponseProcessor};
use crate::sink::EventSink;
use crate::store::{CursorStore, StoreError};
use crate::transport::{SyncRequest, SyncTransport, TransportError};

/// Errors that end one iteration of the poll loop.
#[derive(Debug, Error)]
pub enum IterationError {
    /// Uploading the filter or fetching a response failed.
    #[error("sync request failed: {0}")]
    Transport(#[from] TransportError),

    /// Reading or writing the cursor failed.
    #[error("cursor store failed: {0}")]
    Store(#[from] StoreError),

    /// Processing the fetched response failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Errors that end the poll loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The failure policy gave up.
    #[error(transparent)]
    Escalated(#[from] Escalation),
}

/// Cloneable handle that stops a running engine.
///
/// Stopping is sticky: once stopped, the engine cannot be restarted.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask the engine to stop.
    ///
    /// Interrupts a pending fetch or backoff sleep. A response already being
    /// processed is finished first.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to stop notifications.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolve once a stop has been requested.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    // The engine owns a sender, so this only errors if the engine is gone.
    let _ = rx.wait_for(|stopped| *stopped).await;
}

/// The sync poll loop.
///
/// Collaborators are injected: the transport, the cursor store, the event
/// sink, a diagnostics receiver and the failed-sync policy. A single loop
/// runs at a time; `run` takes `&mut self`.
pub struct SyncEngine<T, S, K> {
    config: SyncConfig,
    transport: T,
    store: S,
    sink: K,
    diagnostics: Arc<dyn Diagnostics>,
    policy: Box<dyn OnFailedSync>,
    processor: ResponseProcessor,
    phase: SyncPhase,
    stop: StopHandle,
}

impl<T, S, K> SyncEngine<T, S, K>
where
    T: SyncTransport,
    S: CursorStore,
    K: EventSink,
{
    /// Create an engine.
    ///
    /// Diagnostics default to [`TracingDiagnostics`]; the failure policy
    /// comes from `config`.
    pub fn new(config: SyncConfig, transport: T, store: S, sink: K) -> Self {
        let policy = config.failure_policy();
        Self {
            config,
            transport,
            store,
            sink,
            diagnostics: Arc::new(TracingDiagnostics),
            policy,
            processor: ResponseProcessor::new(),
            phase: SyncPhase::new(),
            stop: StopHandle::new(),
        }
    }

    /// Replace the diagnostics receiver.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Replace the failed-sync policy.
    pub fn with_failure_policy(mut self, policy: impl OnFailedSync + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Handle for stopping the loop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current loop phase.
    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    /// The response processor (read access to room state).
    pub fn processor(&self) -> &ResponseProcessor {
        &self.processor
    }

    /// The cursor store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Return the stored filter id, uploading the configured filter first if
    /// none is stored.
    pub async fn ensure_filter(&self) -> Result<String, IterationError> {
        let filter_id = self.store.load_filter_id().await?;
        if !filter_id.is_empty() {
            return Ok(filter_id);
        }

        let filter = self.config.filter();
        let filter_id = self.transport.create_filter(&filter).await?;
        self.store.save_filter_id(&filter_id).await?;
        tracing::info!(filter_id = %filter_id, limit = filter.timeline_limit(), "Uploaded sync filter");
        Ok(filter_id)
    }

    /// Fetch the next response for the stored cursor.
    pub async fn fetch(&self) -> Result<(SyncCursor, SyncResponse), IterationError> {
        let filter_id = self.ensure_filter().await?;
        let next_batch = self.store.load_next_batch().await?;
        let cursor = SyncCursor::new(filter_id, next_batch);

        let request =
            SyncRequest::new(cursor.since(), &cursor.filter_id).with_timeout(self.config.timeout);
        tracing::debug!(since = ?request.since, filter_id = %request.filter_id, "Syncing");
        let response = self.transport.sync(&request).await?;
        Ok((cursor, response))
    }

    /// Process a fetched response and persist its cursor.
    ///
    /// The cursor is only advanced when processing succeeded.
    pub async fn apply(
        &mut self,
        cursor: &SyncCursor,
        response: &SyncResponse,
    ) -> Result<ProcessReport, IterationError> {
        let report = self
            .processor
            .process(response, cursor, &self.sink, self.diagnostics.as_ref())
            .await?;

        if response.next_batch.is_empty() {
            tracing::warn!(since = %cursor.next_batch, "Response has no next_batch, cursor not advanced");
            return Ok(report);
        }

        self.store.save_next_batch(&response.next_batch).await?;
        tracing::debug!(
            since = %cursor.next_batch,
            next_batch = %response.next_batch,
            emitted = report.emitted,
            "Advanced sync cursor"
        );
        Ok(report)
    }

    /// Run one fetch/process/persist iteration without the loop.
    pub async fn poll_once(&mut self) -> Result<ProcessReport, IterationError> {
        let (cursor, response) = self.fetch().await?;
        self.apply(&cursor, &response).await
    }

    /// Run the poll loop until stopped.
    ///
    /// Recoverable errors are reported to diagnostics and retried. Returns
    /// `Ok(())` after a stop, or the escalation if the failure policy gave up.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        let mut stop_rx = self.stop.subscribe();
        let mut actions = VecDeque::from(self.transition(PhaseEvent::Started));
        if !actions.is_empty() {
            tracing::info!("Sync engine started");
        }

        while let Some(action) = actions.pop_front() {
            if self.stop.is_stopped() && action != Action::Halt {
                actions.extend(self.transition(PhaseEvent::StopRequested));
                continue;
            }

            let event = match action {
                Action::Poll => self.poll(&mut stop_rx).await?,
                Action::Sleep { delay } => {
                    tokio::select! {
                        _ = stopped(&mut stop_rx) => PhaseEvent::StopRequested,
                        _ = tokio::time::sleep(delay) => PhaseEvent::BackoffElapsed,
                    }
                }
                Action::Halt => {
                    tracing::info!("Sync engine stopped");
                    continue;
                }
            };
            actions.extend(self.transition(event));
        }
        Ok(())
    }

    /// One loop iteration, mapped to the phase event it produced.
    async fn poll(&mut self, stop_rx: &mut watch::Receiver<bool>) -> Result<PhaseEvent, EngineError> {
        let fetched = tokio::select! {
            _ = stopped(stop_rx) => None,
            fetched = self.fetch() => Some(fetched),
        };
        let result = match fetched {
            None => return Ok(PhaseEvent::StopRequested),
            Some(Ok((cursor, response))) => self.apply(&cursor, &response).await,
            Some(Err(e)) => Err(e),
        };

        let attempt = self.phase.failures().saturating_add(1);
        match result {
            Ok(_) => Ok(PhaseEvent::IterationSucceeded),
            Err(IterationError::Processing(error)) => {
                self.diagnostics.processing_failed(&error);
                Ok(PhaseEvent::ProcessingFailed)
            }
            Err(IterationError::Transport(error)) => {
                let decision = self.policy.on_failed_sync(&error, attempt);
                if let Some(escalation) = decision.escalate {
                    tracing::error!(attempt, error = %error, "Failure policy escalated, stopping");
                    self.transition(PhaseEvent::StopRequested);
                    return Err(EngineError::Escalated(escalation));
                }
                self.diagnostics.sync_failed(&error, decision.backoff);
                Ok(PhaseEvent::FetchFailed {
                    delay: decision.backoff,
                })
            }
            Err(IterationError::Store(error)) => {
                self.diagnostics.store_failed(&error);
                Ok(PhaseEvent::StoreFailed {
                    delay: self.policy.on_store_failed(&error, attempt),
                })
            }
        }
    }

    fn transition(&mut self, event: PhaseEvent) -> Vec<Action> {
        let phase = std::mem::take(&mut self.phase);
        let (phase, actions) = phase.on_event(event);
        self.phase = phase;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticRecord, RecordingDiagnostics};
    use crate::policy::{ExponentialBackoff, FixedBackoff};
    use crate::sink::{event_channel, ChannelSink, SinkError, SinkPolicy};
    use crate::store::MemoryCursorStore;
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use roomsync_types::{Event, RoomId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const ROOM: &str = "!room:example.org";

    fn delta(next_batch: &str, body: &str) -> SyncResponse {
        let mut response = SyncResponse::new(next_batch);
        let joined = response.joined_room_mut(&RoomId::from(ROOM));
        joined
            .state
            .push_value(&json!({"type": "m.room.topic", "sender": "@a:x", "state_key": "", "content": {"topic": body}}))
            .unwrap();
        joined
            .timeline
            .push_value(&json!({"type": "m.room.message", "sender": "@a:x", "content": {"body": body}}))
            .unwrap();
        response
    }

    fn fast_config() -> SyncConfig {
        SyncConfig::new().with_timeout(Duration::from_millis(10))
    }

    fn engine_with(
        store: MemoryCursorStore,
    ) -> (
        SyncEngine<MockTransport, MemoryCursorStore, ChannelSink>,
        MockTransport,
        mpsc::Receiver<Event>,
        Arc<RecordingDiagnostics>,
    ) {
        let transport = MockTransport::new();
        let (sink, rx) = event_channel(64, SinkPolicy::Block);
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let engine = SyncEngine::new(fast_config(), transport.clone(), store, sink)
            .with_diagnostics(diagnostics.clone())
            .with_failure_policy(FixedBackoff::new(Duration::from_millis(20)));
        (engine, transport, rx, diagnostics)
    }

    fn resumed() -> MemoryCursorStore {
        MemoryCursorStore::with_cursor(SyncCursor::new("filter-0", "s0"))
    }

    /// Collect `n` events, then stop the engine.
    fn stop_after(
        n: usize,
        mut rx: mpsc::Receiver<Event>,
        stop: StopHandle,
    ) -> tokio::task::JoinHandle<Vec<Event>> {
        tokio::spawn(async move {
            let mut events = Vec::new();
            while events.len() < n {
                match rx.recv().await {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
            stop.stop();
            events
        })
    }

    async fn run_bounded(
        engine: &mut SyncEngine<MockTransport, MemoryCursorStore, ChannelSink>,
    ) -> Result<(), EngineError> {
        tokio::time::timeout(Duration::from_secs(5), engine.run())
            .await
            .expect("engine did not stop")
    }

    /// Sink that rejects the first `failures` sends, then forwards.
    struct FlakySink {
        failures: AtomicUsize,
        tx: mpsc::Sender<Event>,
    }

    #[async_trait]
    impl EventSink for FlakySink {
        async fn send(&self, event: Event) -> Result<(), SinkError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(SinkError::Rejected("consumer restarting".into()));
            }
            self.tx.send(event).await.map_err(|_| SinkError::Closed)
        }
    }

    /// Store whose first `failing_saves` next_batch writes fail.
    struct FlakyStore {
        inner: MemoryCursorStore,
        failing_saves: AtomicUsize,
    }

    #[async_trait]
    impl CursorStore for FlakyStore {
        async fn save_filter_id(&self, filter_id: &str) -> Result<(), StoreError> {
            self.inner.save_filter_id(filter_id).await
        }

        async fn load_filter_id(&self) -> Result<String, StoreError> {
            self.inner.load_filter_id().await
        }

        async fn save_next_batch(&self, next_batch: &str) -> Result<(), StoreError> {
            if self.failing_saves.load(Ordering::SeqCst) > 0 {
                self.failing_saves.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.save_next_batch(next_batch).await
        }

        async fn load_next_batch(&self) -> Result<String, StoreError> {
            self.inner.load_next_batch().await
        }
    }

    // ===========================================
    // Single iterations
    // ===========================================

    #[tokio::test]
    async fn bootstrap_then_delta() {
        let (mut engine, transport, mut rx, _) = engine_with(MemoryCursorStore::new());
        transport.queue_response(delta("s1", "history"));
        transport.queue_response(delta("s2", "fresh"));

        let first = engine.poll_once().await.unwrap();
        assert!(first.bootstrap);
        assert!(rx.try_recv().is_err(), "bootstrap must not emit");
        assert_eq!(engine.store().snapshot().await.next_batch, "s1");

        let second = engine.poll_once().await.unwrap();
        assert!(!second.bootstrap);
        assert_eq!(second.emitted, 2);
        assert_eq!(rx.recv().await.unwrap().event_type, "m.room.topic");
        assert_eq!(rx.recv().await.unwrap().content["body"], "fresh");
        assert_eq!(engine.store().snapshot().await.next_batch, "s2");

        let requests = transport.requests();
        assert_eq!(requests[0].since, None);
        assert_eq!(requests[1].since.as_deref(), Some("s1"));
        assert_eq!(requests[1].timeout, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn filter_is_uploaded_once_and_stored() {
        let (mut engine, transport, _rx, _) = engine_with(MemoryCursorStore::new());
        transport.queue_response(SyncResponse::new("s1"));
        transport.queue_response(SyncResponse::new("s2"));

        engine.poll_once().await.unwrap();
        engine.poll_once().await.unwrap();

        assert_eq!(transport.filters().len(), 1);
        assert_eq!(transport.filters()[0].timeline_limit(), 50);
        assert_eq!(engine.store().load_filter_id().await.unwrap(), "filter-1");
        assert!(transport.requests().iter().all(|r| r.filter_id == "filter-1"));
    }

    #[tokio::test]
    async fn stored_filter_and_cursor_are_reused() {
        let (mut engine, transport, _rx, _) = engine_with(resumed());
        transport.queue_response(SyncResponse::new("s1"));

        engine.poll_once().await.unwrap();

        assert!(transport.filters().is_empty());
        let request = transport.last_request().unwrap();
        assert_eq!(request.filter_id, "filter-0");
        assert_eq!(request.since.as_deref(), Some("s0"));
    }

    #[tokio::test]
    async fn filter_upload_failure_is_a_transport_error() {
        let (mut engine, transport, _rx, _) = engine_with(MemoryCursorStore::new());
        transport.fail_next_create_filter("refused");

        let result = engine.poll_once().await;

        assert!(matches!(result, Err(IterationError::Transport(_))));
        assert_eq!(engine.store().load_filter_id().await.unwrap(), "");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_leaves_cursor() {
        let (mut engine, transport, _rx, _) = engine_with(resumed());
        transport.fail_next_sync("connection reset");

        let result = engine.poll_once().await;

        assert!(matches!(result, Err(IterationError::Transport(_))));
        assert_eq!(engine.store().snapshot().await, SyncCursor::new("filter-0", "s0"));
    }

    #[tokio::test]
    async fn processing_failure_leaves_cursor() {
        let (tx, _rx) = mpsc::channel(16);
        let sink = FlakySink {
            failures: AtomicUsize::new(1),
            tx,
        };
        let transport = MockTransport::new();
        transport.queue_response(delta("s1", "x"));
        let mut engine = SyncEngine::new(fast_config(), transport, resumed(), sink)
            .with_diagnostics(Arc::new(RecordingDiagnostics::new()));

        let result = engine.poll_once().await;

        match result {
            Err(IterationError::Processing(error)) => assert_eq!(error.since, "s0"),
            other => panic!("Expected processing error, got {:?}", other),
        }
        assert_eq!(engine.store().snapshot().await.next_batch, "s0");
    }

    #[tokio::test]
    async fn store_failure_leaves_cursor() {
        let store = FlakyStore {
            inner: resumed(),
            failing_saves: AtomicUsize::new(1),
        };
        let transport = MockTransport::new();
        transport.queue_response(delta("s1", "x"));
        let (sink, _rx) = event_channel(16, SinkPolicy::Block);
        let mut engine = SyncEngine::new(fast_config(), transport, store, sink);

        let result = engine.poll_once().await;

        assert!(matches!(result, Err(IterationError::Store(_))));
        assert_eq!(engine.store().inner.snapshot().await.next_batch, "s0");
    }

    #[tokio::test]
    async fn empty_next_batch_does_not_advance() {
        let (mut engine, transport, _rx, _) = engine_with(resumed());
        transport.queue_response(SyncResponse::new(""));

        engine.poll_once().await.unwrap();

        assert_eq!(engine.store().snapshot().await.next_batch, "s0");
    }

    // ===========================================
    // Poll loop
    // ===========================================

    #[tokio::test]
    async fn loop_processes_until_stopped() {
        let (mut engine, transport, rx, _) = engine_with(resumed());
        transport.queue_response(delta("s1", "one"));
        transport.queue_response(delta("s2", "two"));
        transport.hang_when_empty(true);

        let consumer = stop_after(4, rx, engine.stop_handle());
        run_bounded(&mut engine).await.unwrap();

        let events = consumer.await.unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].content["body"], "two");
        assert!(engine.phase().is_stopped());
        assert_eq!(engine.store().snapshot().await.next_batch, "s2");
        let topic = engine
            .processor()
            .room(&RoomId::from(ROOM))
            .unwrap()
            .state
            .get("m.room.topic", "")
            .unwrap();
        assert_eq!(topic.content["topic"], "two");
    }

    #[tokio::test]
    async fn processing_failure_replays_same_window() {
        let (tx, rx) = mpsc::channel(16);
        let sink = FlakySink {
            failures: AtomicUsize::new(1),
            tx,
        };
        let transport = MockTransport::new();
        // The server answers the replayed `since` with the same window.
        transport.queue_response(delta("s1", "x"));
        transport.queue_response(delta("s1", "x"));
        transport.hang_when_empty(true);
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let mut engine = SyncEngine::new(fast_config(), transport.clone(), resumed(), sink)
            .with_diagnostics(diagnostics.clone());

        let consumer = stop_after(2, rx, engine.stop_handle());
        tokio::time::timeout(Duration::from_secs(5), engine.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(consumer.await.unwrap().len(), 2);
        assert_eq!(diagnostics.processing_failures(), 1);
        match &diagnostics.records()[0] {
            DiagnosticRecord::ProcessingFailed { since, .. } => assert_eq!(since, "s0"),
            other => panic!("Expected ProcessingFailed, got {:?}", other),
        }
        let requests = transport.requests();
        assert_eq!(requests[0].since, requests[1].since);
        assert_eq!(engine.store().snapshot().await.next_batch, "s1");
    }

    #[tokio::test]
    async fn fetch_failure_backs_off_and_retries() {
        let (mut engine, transport, rx, diagnostics) = engine_with(resumed());
        transport.queue_error(TransportError::Timeout);
        transport.queue_response(delta("s1", "after"));
        transport.hang_when_empty(true);

        let consumer = stop_after(2, rx, engine.stop_handle());
        run_bounded(&mut engine).await.unwrap();

        assert_eq!(consumer.await.unwrap().len(), 2);
        assert_eq!(
            diagnostics.records()[0],
            DiagnosticRecord::SyncFailed {
                error: "request timed out".into(),
                backoff: Duration::from_millis(20),
            }
        );
        assert!(transport.requests().len() >= 2);
        assert_eq!(engine.store().snapshot().await.next_batch, "s1");
    }

    #[tokio::test]
    async fn store_failure_backs_off_and_recovers() {
        let store = FlakyStore {
            inner: resumed(),
            failing_saves: AtomicUsize::new(1),
        };
        let transport = MockTransport::new();
        transport.queue_response(delta("s1", "x"));
        transport.queue_response(delta("s1", "x"));
        transport.hang_when_empty(true);
        let (sink, rx) = event_channel(16, SinkPolicy::Block);
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let mut engine = SyncEngine::new(fast_config(), transport.clone(), store, sink)
            .with_diagnostics(diagnostics.clone())
            .with_failure_policy(FixedBackoff::new(Duration::from_millis(20)));

        // Both passes emit; only the second one persists.
        let consumer = stop_after(4, rx, engine.stop_handle());
        tokio::time::timeout(Duration::from_secs(5), engine.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(consumer.await.unwrap().len(), 4);
        assert_eq!(diagnostics.store_failures(), 1);
        let requests = transport.requests();
        assert_eq!(requests[1].since.as_deref(), Some("s0"));
        assert_eq!(engine.store().inner.snapshot().await.next_batch, "s1");
    }

    #[tokio::test]
    async fn escalation_stops_engine() {
        let (engine, transport, _rx, diagnostics) = engine_with(resumed());
        let mut engine = engine.with_failure_policy(
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(5))
                .with_jitter(Duration::ZERO)
                .with_max_attempts(2),
        );
        transport.queue_error(TransportError::ConnectionFailed("down".into()));
        transport.queue_error(TransportError::ConnectionFailed("still down".into()));

        let result = run_bounded(&mut engine).await;

        match result {
            Err(EngineError::Escalated(escalation)) => assert_eq!(escalation.attempt, 2),
            other => panic!("Expected escalation, got {:?}", other),
        }
        assert!(engine.phase().is_stopped());
        assert_eq!(diagnostics.sync_failures(), 1);
    }

    #[tokio::test]
    async fn stop_interrupts_pending_fetch() {
        let (mut engine, transport, _rx, _) = engine_with(resumed());
        transport.hang_when_empty(true);
        let stop = engine.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop.stop();
        });
        run_bounded(&mut engine).await.unwrap();

        assert!(engine.phase().is_stopped());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn stop_interrupts_backoff() {
        let (engine, transport, _rx, diagnostics) = engine_with(resumed());
        let mut engine = engine.with_failure_policy(FixedBackoff::new(Duration::from_secs(3600)));
        let stop = engine.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop.stop();
        });
        run_bounded(&mut engine).await.unwrap();

        assert!(engine.phase().is_stopped());
        assert_eq!(diagnostics.sync_failures(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn stopped_engine_does_not_poll() {
        let (mut engine, transport, _rx, _) = engine_with(resumed());
        engine.stop_handle().stop();

        run_bounded(&mut engine).await.unwrap();
        // A second run after stopping is a no-op too.
        run_bounded(&mut engine).await.unwrap();

        assert!(transport.requests().is_empty());
        assert!(engine.phase().is_stopped());
    }
}
