//! Sync response shape.
//!
//! A response is a delta since the previous cursor, split into three room
//! partitions. Event payloads are kept as raw JSON so that one malformed
//! event cannot fail decoding of the whole response; they are decoded one at
//! a time by the processor.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{RoomId, TypesError};

/// An undecoded event payload.
pub type RawEvent = Box<RawValue>;

/// One sync response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Token to pass as `since` on the next request.
    #[serde(default)]
    pub next_batch: String,
    /// Room partitions.
    #[serde(default)]
    pub rooms: Rooms,
}

/// The three room partitions of a [`SyncResponse`].
///
/// Maps are ordered by room id so that processing order is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rooms {
    /// Rooms the user is joined to.
    #[serde(default)]
    pub join: BTreeMap<RoomId, JoinedRoom>,
    /// Rooms the user is invited to.
    #[serde(default)]
    pub invite: BTreeMap<RoomId, InvitedRoom>,
    /// Rooms the user has left (or been removed from).
    #[serde(default)]
    pub leave: BTreeMap<RoomId, LeftRoom>,
}

/// An ordered list of raw events (`{"events": [...]}` on the wire).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBatch {
    /// Raw event payloads in server order.
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// A joined room: state section plus timeline section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinedRoom {
    /// State events.
    #[serde(default)]
    pub state: EventBatch,
    /// Timeline events.
    #[serde(default)]
    pub timeline: EventBatch,
}

/// An invited room. Invites carry stripped state only, no timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitedRoom {
    /// Invite state events (`invite_state`, also accepted as `state`).
    #[serde(default, alias = "state")]
    pub invite_state: EventBatch,
}

/// A left room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeftRoom {
    /// State events (present on the wire, not applied by the processor).
    #[serde(default)]
    pub state: EventBatch,
    /// Timeline events; the leave notice itself arrives here.
    #[serde(default)]
    pub timeline: EventBatch,
}

impl EventBatch {
    /// Append a raw event from JSON text.
    ///
    /// The text must be syntactically valid JSON; whether it is a valid
    /// event is only checked when the processor decodes it.
    pub fn push_json(&mut self, json: impl Into<String>) -> Result<(), TypesError> {
        let raw = RawValue::from_string(json.into()).map_err(TypesError::InvalidRawEvent)?;
        self.events.push(raw);
        Ok(())
    }

    /// Append a raw event from a JSON value.
    pub fn push_value(&mut self, value: &Value) -> Result<(), TypesError> {
        let raw = serde_json::value::to_raw_value(value).map_err(TypesError::Serialization)?;
        self.events.push(raw);
        Ok(())
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl SyncResponse {
    /// Create an empty response carrying `next_batch`.
    pub fn new(next_batch: impl Into<String>) -> Self {
        Self {
            next_batch: next_batch.into(),
            rooms: Rooms::default(),
        }
    }

    /// Decode a response from JSON text.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        serde_json::from_str(json).map_err(TypesError::InvalidResponse)
    }

    /// Decode a response from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(TypesError::InvalidResponse)
    }

    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::Serialization)
    }

    /// Get or create the joined-room entry for `room_id`.
    pub fn joined_room_mut(&mut self, room_id: &RoomId) -> &mut JoinedRoom {
        self.rooms.join.entry(room_id.clone()).or_default()
    }

    /// Get or create the invited-room entry for `room_id`.
    pub fn invited_room_mut(&mut self, room_id: &RoomId) -> &mut InvitedRoom {
        self.rooms.invite.entry(room_id.clone()).or_default()
    }

    /// Get or create the left-room entry for `room_id`.
    pub fn left_room_mut(&mut self, room_id: &RoomId) -> &mut LeftRoom {
        self.rooms.leave.entry(room_id.clone()).or_default()
    }

    /// Total number of raw events across all partitions and sections.
    pub fn event_count(&self) -> usize {
        let join: usize = self
            .rooms
            .join
            .values()
            .map(|r| r.state.len() + r.timeline.len())
            .sum();
        let invite: usize = self.rooms.invite.values().map(|r| r.invite_state.len()).sum();
        let leave: usize = self
            .rooms
            .leave
            .values()
            .map(|r| r.state.len() + r.timeline.len())
            .sum();
        join + invite + leave
    }
}
