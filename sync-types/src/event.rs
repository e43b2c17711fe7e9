//! Decoded protocol events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RoomId;

/// A single protocol event as delivered inside a sync response.
///
/// The presence of `state_key` is what makes an event a *state event*; an
/// empty string is a valid state key (used for singleton state such as the
/// room name). Timeline-only messages carry no state key at all.
///
/// Events are treated as immutable once decoded. The one exception is the
/// room id, which sync responses usually omit inside a room block and which
/// the processor fills in from the enclosing partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `m.room.member`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// User id of the sender.
    pub sender: String,
    /// Room the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// State key, present only on state events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Opaque content body.
    #[serde(default)]
    pub content: Value,
    /// Server-assigned event id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Origin server timestamp in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_ts: Option<u64>,
    /// Unsigned data attached by the server (opaque).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<Value>,
}

impl Event {
    /// Create a timeline (non-state) event.
    pub fn message(event_type: &str, sender: &str, content: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            sender: sender.to_string(),
            room_id: None,
            state_key: None,
            content,
            event_id: None,
            origin_server_ts: None,
            unsigned: None,
        }
    }

    /// Create a state event with the given state key.
    pub fn state(event_type: &str, state_key: &str, sender: &str, content: Value) -> Self {
        Self {
            state_key: Some(state_key.to_string()),
            ..Self::message(event_type, sender, content)
        }
    }

    /// Check whether this is a state event.
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// Return a copy of this event assigned to `room_id`.
    pub fn with_room_id(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }
}
