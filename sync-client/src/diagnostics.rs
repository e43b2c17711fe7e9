//! Diagnostics collaborator.
//!
//! The engine and processor report recoverable problems here instead of
//! failing. [`TracingDiagnostics`] forwards them to `tracing`;
//! [`RecordingDiagnostics`] keeps them in memory for inspection.

use roomsync_core::ParseFailure;
use roomsync_types::RoomId;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::processor::ProcessingError;
use crate::store::StoreError;
use crate::transport::TransportError;

/// Receiver of diagnostic reports.
pub trait Diagnostics: Send + Sync {
    /// One event payload could not be decoded and was skipped.
    fn event_decode_failed(&self, failure: &ParseFailure);

    /// Processing a response failed; the iteration was abandoned.
    fn processing_failed(&self, error: &ProcessingError);

    /// A fetch failed; the engine will wait `backoff` before retrying.
    fn sync_failed(&self, error: &TransportError, backoff: Duration);

    /// Reading or writing the cursor failed.
    fn store_failed(&self, error: &StoreError);
}

/// Diagnostics written as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn event_decode_failed(&self, failure: &ParseFailure) {
        tracing::warn!(
            room_id = %failure.room_id,
            error = %failure.source,
            raw = %failure.raw,
            "Failed to decode event"
        );
    }

    fn processing_failed(&self, error: &ProcessingError) {
        tracing::error!(since = %error.since, "{}\n{}", error, error.trace());
    }

    fn sync_failed(&self, error: &TransportError, backoff: Duration) {
        tracing::error!(backoff_ms = backoff.as_millis() as u64, "Sync errored: {}", error);
    }

    fn store_failed(&self, error: &StoreError) {
        tracing::error!("Cursor store failed: {}", error);
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticRecord {
    /// An event payload failed to decode.
    DecodeFailed {
        /// Partition room id.
        room_id: RoomId,
        /// Raw payload text.
        raw: String,
        /// Decode error message.
        error: String,
    },
    /// Processing a response failed.
    ProcessingFailed {
        /// Cursor in effect.
        since: String,
        /// Error message.
        error: String,
    },
    /// A fetch failed.
    SyncFailed {
        /// Error message.
        error: String,
        /// Backoff chosen.
        backoff: Duration,
    },
    /// The cursor store failed.
    StoreFailed {
        /// Error message.
        error: String,
    },
}

/// Diagnostics kept in memory, optionally also forwarded to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
    forward: bool,
}

impl RecordingDiagnostics {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every record to [`TracingDiagnostics`].
    pub fn forwarding() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            forward: true,
        }
    }

    /// All records so far.
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.lock().clone()
    }

    /// Number of decode failures recorded.
    pub fn decode_failures(&self) -> usize {
        self.count(|r| matches!(r, DiagnosticRecord::DecodeFailed { .. }))
    }

    /// Number of processing failures recorded.
    pub fn processing_failures(&self) -> usize {
        self.count(|r| matches!(r, DiagnosticRecord::ProcessingFailed { .. }))
    }

    /// Number of sync failures recorded.
    pub fn sync_failures(&self) -> usize {
        self.count(|r| matches!(r, DiagnosticRecord::SyncFailed { .. }))
    }

    /// Number of store failures recorded.
    pub fn store_failures(&self) -> usize {
        self.count(|r| matches!(r, DiagnosticRecord::StoreFailed { .. }))
    }

    fn count(&self, pred: impl Fn(&DiagnosticRecord) -> bool) -> usize {
        self.lock().iter().filter(|r| pred(r)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DiagnosticRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, record: DiagnosticRecord) {
        self.lock().push(record);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn event_decode_failed(&self, failure: &ParseFailure) {
        if self.forward {
            TracingDiagnostics.event_decode_failed(failure);
        }
        self.push(DiagnosticRecord::DecodeFailed {
            room_id: failure.room_id.clone(),
            raw: failure.raw.clone(),
            error: failure.source.to_string(),
        });
    }

    fn processing_failed(&self, error: &ProcessingError) {
        if self.forward {
            TracingDiagnostics.processing_failed(error);
        }
        self.push(DiagnosticRecord::ProcessingFailed {
            since: error.since.clone(),
            error: error.to_string(),
        });
    }

    fn sync_failed(&self, error: &TransportError, backoff: Duration) {
        if self.forward {
            TracingDiagnostics.sync_failed(error, backoff);
        }
        self.push(DiagnosticRecord::SyncFailed {
            error: error.to_string(),
            backoff,
        });
    }

    fn store_failed(&self, error: &StoreError) {
        if self.forward {
            TracingDiagnostics.store_failed(error);
        }
        self.push(DiagnosticRecord::StoreFailed {
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_core::parse_event;
    use serde_json::value::RawValue;

    fn failure() -> ParseFailure {
        let raw = RawValue::from_string(r#"{"type": 1}"#.to_string()).unwrap();
        parse_event(&RoomId::from("!r:x"), &raw).unwrap_err()
    }

    #[test]
    fn records_decode_failure_with_raw_text() {
        let diagnostics = RecordingDiagnostics::new();
        diagnostics.event_decode_failed(&failure());

        assert_eq!(diagnostics.decode_failures(), 1);
        match &diagnostics.records()[0] {
            DiagnosticRecord::DecodeFailed { room_id, raw, .. } => {
                assert_eq!(room_id, &RoomId::from("!r:x"));
                assert_eq!(raw, r#"{"type": 1}"#);
            }
            other => panic!("Expected DecodeFailed, got {:?}", other),
        }
    }

    #[test]
    fn records_sync_failure_with_backoff() {
        let diagnostics = RecordingDiagnostics::new();
        diagnostics.sync_failed(&TransportError::Timeout, Duration::from_secs(10));

        assert_eq!(
            diagnostics.records(),
            vec![DiagnosticRecord::SyncFailed {
                error: "request timed out".into(),
                backoff: Duration::from_secs(10),
            }]
        );
    }

    #[test]
    fn counters_are_independent() {
        let diagnostics = RecordingDiagnostics::forwarding();
        diagnostics.store_failed(&StoreError::Unavailable("disk".into()));
        diagnostics.event_decode_failed(&failure());

        assert_eq!(diagnostics.store_failures(), 1);
        assert_eq!(diagnostics.decode_failures(), 1);
        assert_eq!(diagnostics.processing_failures(), 0);
        assert_eq!(diagnostics.sync_failures(), 0);
    }

    #[test]
    fn tracing_diagnostics_does_not_panic() {
        TracingDiagnostics.event_decode_failed(&failure());
        TracingDiagnostics.sync_failed(&TransportError::Closed, Duration::ZERO);
    }
}
