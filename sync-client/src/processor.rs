//! Response processor: turns one sync response into room state updates and
//! a stream of emitted events.
//!
//! # Ordering
//!
//! Partitions are handled joined → invited → left, rooms in id order:
//!
//! - **joined**: every state event is applied and emitted first, then every
//!   timeline event is emitted (no state mutation). State defines the view
//!   of the room before any message that refers to it is surfaced.
//! - **invited**: invite state events are applied and emitted.
//! - **left**: only timeline events that carry a state key (the leave
//!   notice itself) are applied and emitted, with their `room_id` forced to
//!   the partition's room. Plain messages from a left room are dropped.
//!
//! # Bootstrap
//!
//! When the cursor has no `next_batch` yet, the response is a full
//! historical snapshot rather than a delta. It is discarded untouched so
//! downstream consumers are not flooded with history.
//!
//! # Failures
//!
//! A payload that fails to decode is reported and skipped. A sink failure
//! aborts the response with a [`ProcessingError`]. State applied before the
//! fault is kept: every mutation is a last-write-wins upsert, so a later
//! replay of the same keys converges.

use roomsync_core::{parse_event, Room, RoomStates};
use roomsync_types::{Event, RoomId, SyncCursor, SyncResponse};
use serde_json::value::RawValue;
use std::fmt;
use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::sink::{EventSink, SinkError};

/// Room partition of a sync response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Joined rooms.
    Join,
    /// Invited rooms.
    Invite,
    /// Left rooms.
    Leave,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
        })
    }
}

/// Section of a room block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// State (or invite state) events.
    State,
    /// Timeline events.
    Timeline,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::State => "state",
            Self::Timeline => "timeline",
        })
    }
}

/// Where in a response a fault happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultLocation {
    /// Partition being processed.
    pub partition: Partition,
    /// Room being processed.
    pub room_id: RoomId,
    /// Section of the room block.
    pub section: Section,
    /// Index of the event within the section.
    pub index: usize,
}

impl fmt::Display for FaultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rooms.{}[{}].{}[{}]",
            self.partition, self.room_id, self.section, self.index
        )
    }
}

/// Outcome counters for one processed response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// The response was discarded as a bootstrap snapshot.
    pub bootstrap: bool,
    /// Events handed to the sink.
    pub emitted: usize,
    /// Room state entries written.
    pub state_updates: usize,
    /// Payloads that failed to decode and were skipped.
    pub decode_failures: usize,
    /// Left-room timeline events dropped for lacking a state key.
    pub dropped: usize,
}

/// Processing a response failed part-way.
///
/// Scoped to one iteration: the engine reports it and polls again without
/// advancing the cursor.
#[derive(Debug, Error)]
#[error("failed to process sync response (since={since:?}) at {location}: {source}")]
pub struct ProcessingError {
    /// The `next_batch` cursor in effect for this response.
    pub since: String,
    /// Where processing stopped.
    pub location: FaultLocation,
    /// What had already happened before the fault.
    pub progress: ProcessReport,
    /// Underlying cause.
    #[source]
    pub source: SinkError,
}

impl ProcessingError {
    /// Multi-line diagnostic trace of the failed pass.
    pub fn trace(&self) -> String {
        format!(
            "  at {}\n  since: {:?}\n  emitted before fault: {}\n  state updates retained: {}\n  decode failures: {}\n  dropped: {}\n  cause: {}",
            self.location,
            self.since,
            self.progress.emitted,
            self.progress.state_updates,
            self.progress.decode_failures,
            self.progress.dropped,
            self.source,
        )
    }
}

/// Owns the in-memory room state and applies sync responses to it.
///
/// Nothing else mutates the room state; consumers of emitted events only
/// get read access through [`ResponseProcessor::rooms`].
#[derive(Debug, Default)]
pub struct ResponseProcessor {
    rooms: RoomStates,
}

impl ResponseProcessor {
    /// Create a processor with no room state.
    pub fn new() -> Self {
        Self::default()
    }

    /// All room state.
    pub fn rooms(&self) -> &RoomStates {
        &self.rooms
    }

    /// State of one room.
    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Process one response received for `cursor`.
    ///
    /// Events are sent to `sink` as they are produced; decode failures go to
    /// `diagnostics`.
    pub async fn process<K>(
        &mut self,
        response: &SyncResponse,
        cursor: &SyncCursor,
        sink: &K,
        diagnostics: &dyn Diagnostics,
    ) -> Result<ProcessReport, ProcessingError>
    where
        K: EventSink + ?Sized,
    {
        if cursor.is_bootstrap() {
            tracing::debug!(
                next_batch = %response.next_batch,
                events = response.event_count(),
                "Discarding bootstrap response"
            );
            return Ok(ProcessReport {
                bootstrap: true,
                ..ProcessReport::default()
            });
        }

        let mut pass = Pass {
            since: &cursor.next_batch,
            sink,
            diagnostics,
            report: ProcessReport::default(),
        };

        for (room_id, room) in &response.rooms.join {
            for (index, raw) in room.state.events.iter().enumerate() {
                let Some(event) = pass.decode(room_id, raw) else {
                    continue;
                };
                if self.rooms.apply(room_id, &event) {
                    pass.report.state_updates += 1;
                }
                pass.emit(event, || at(Partition::Join, room_id, Section::State, index))
                    .await?;
            }
            for (index, raw) in room.timeline.events.iter().enumerate() {
                let Some(event) = pass.decode(room_id, raw) else {
                    continue;
                };
                pass.emit(event, || at(Partition::Join, room_id, Section::Timeline, index))
                    .await?;
            }
        }

        for (room_id, room) in &response.rooms.invite {
            for (index, raw) in room.invite_state.events.iter().enumerate() {
                let Some(event) = pass.decode(room_id, raw) else {
                    continue;
                };
                if self.rooms.apply(room_id, &event) {
                    pass.report.state_updates += 1;
                }
                pass.emit(event, || at(Partition::Invite, room_id, Section::State, index))
                    .await?;
            }
        }

        for (room_id, room) in &response.rooms.leave {
            for (index, raw) in room.timeline.events.iter().enumerate() {
                let Some(event) = pass.decode(room_id, raw) else {
                    continue;
                };
                if !event.is_state() {
                    pass.report.dropped += 1;
                    continue;
                }
                let event = event.with_room_id(room_id.clone());
                if self.rooms.apply(room_id, &event) {
                    pass.report.state_updates += 1;
                }
                pass.emit(event, || at(Partition::Leave, room_id, Section::Timeline, index))
                    .await?;
            }
        }

        let report = pass.report;
        tracing::debug!(
            since = %cursor.next_batch,
            next_batch = %response.next_batch,
            emitted = report.emitted,
            state_updates = report.state_updates,
            decode_failures = report.decode_failures,
            dropped = report.dropped,
            "Processed sync response"
        );
        Ok(report)
    }
}

fn at(partition: Partition, room_id: &RoomId, section: Section, index: usize) -> FaultLocation {
    FaultLocation {
        partition,
        room_id: room_id.clone(),
        section,
        index,
    }
}

/// Per-response bookkeeping.
struct Pass<'a, K: ?Sized> {
    since: &'a str,
    sink: &'a K,
    diagnostics: &'a dyn Diagnostics,
    report: ProcessReport,
}

impl<K: EventSink + ?Sized> Pass<'_, K> {
    fn decode(&mut self, room_id: &RoomId, raw: &RawValue) -> Option<Event> {
        match parse_event(room_id, raw) {
            Ok(event) => Some(event),
            Err(failure) => {
                self.report.decode_failures += 1;
                self.diagnostics.event_decode_failed(&failure);
                None
            }
        }
    }

    async fn emit(
        &mut self,
        event: Event,
        location: impl FnOnce() -> FaultLocation,
    ) -> Result<(), ProcessingError> {
        match self.sink.send(event).await {
            Ok(()) => {
                self.report.emitted += 1;
                Ok(())
            }
            Err(source) => Err(ProcessingError {
                since: self.since.to_string(),
                location: location(),
                progress: self.report,
                source,
            }),
        }
    }
}
