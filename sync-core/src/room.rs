//! In-memory room state.
//!
//! Room state is rebuilt purely from replaying sync deltas. It is never
//! persisted: a restart starts over from whatever cursor was saved.

use roomsync_types::{Event, RoomId};
use std::collections::HashMap;

/// Key of one piece of room state: `(event_type, state_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    /// Event type, e.g. `m.room.member`.
    pub event_type: String,
    /// State key, e.g. a user id for membership or `""` for the room name.
    pub state_key: String,
}

impl StateKey {
    /// Create a key from its parts.
    pub fn new(event_type: &str, state_key: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            state_key: state_key.to_string(),
        }
    }

    /// The key an event would be stored under, or `None` for non-state events.
    pub fn of(event: &Event) -> Option<Self> {
        event
            .state_key
            .as_deref()
            .map(|state_key| Self::new(&event.event_type, state_key))
    }
}

/// Latest state event per [`StateKey`] for one room. Last write wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    events: HashMap<StateKey, Event>,
}

impl RoomState {
    /// Create an empty room state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a state event.
    ///
    /// Returns `false` (and changes nothing) if the event has no state key.
    pub fn apply(&mut self, event: &Event) -> bool {
        match StateKey::of(event) {
            Some(key) => {
                self.events.insert(key, event.clone());
                true
            }
            None => false,
        }
    }

    /// Look up the current event for `(event_type, state_key)`.
    pub fn get(&self, event_type: &str, state_key: &str) -> Option<&Event> {
        self.events.get(&StateKey::new(event_type, state_key))
    }

    /// Number of distinct state keys.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether no state has been applied.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over all `(key, event)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &Event)> {
        self.events.iter()
    }
}

/// A room: its id plus its reconstructed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Room {
    /// Room identifier.
    pub room_id: RoomId,
    /// Current state.
    pub state: RoomState,
}

impl Room {
    /// Create an empty room.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            state: RoomState::new(),
        }
    }
}

/// State for every room seen so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomStates {
    rooms: HashMap<RoomId, Room>,
}

impl RoomStates {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` to the room `room_id`.
    ///
    /// The room is keyed by the partition it was delivered in, not by the
    /// event's own `room_id`. Non-state events are ignored and do not create
    /// a room entry. Returns whether state changed.
    pub fn apply(&mut self, room_id: &RoomId, event: &Event) -> bool {
        if !event.is_state() {
            return false;
        }
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()))
            .state
            .apply(event)
    }

    /// Get a room by id.
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of rooms with any state.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check whether no room has state.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Iterate over all rooms in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic(text: &str) -> Event {
        Event::state("m.room.topic", "", "@a:x", json!({"topic": text}))
    }

    #[test]
    fn state_event_is_stored_by_type_and_key() {
        let mut state = RoomState::new();
        assert!(state.apply(&topic("one")));

        let stored = state.get("m.room.topic", "").unwrap();
        assert_eq!(stored.content["topic"], "one");
        assert!(state.get("m.room.topic", "other").is_none());
    }

    #[test]
    fn last_write_wins() {
        let mut state = RoomState::new();
        state.apply(&topic("one"));
        state.apply(&topic("two"));

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("m.room.topic", "").unwrap().content["topic"], "two");
    }

    #[test]
    fn non_state_event_is_ignored() {
        let mut state = RoomState::new();
        let msg = Event::message("m.room.message", "@a:x", json!({"body": "hi"}));
        assert!(!state.apply(&msg));
        assert!(state.is_empty());
    }

    #[test]
    fn distinct_state_keys_coexist() {
        let mut state = RoomState::new();
        state.apply(&Event::state("m.room.member", "@a:x", "@a:x", json!({"membership": "join"})));
        state.apply(&Event::state("m.room.member", "@b:x", "@b:x", json!({"membership": "join"})));
        assert_eq!(state.len(), 2);
        assert_eq!(state.iter().count(), 2);
    }

    #[test]
    fn room_states_key_by_partition_room() {
        let mut rooms = RoomStates::new();
        let partition = RoomId::from("!partition:x");
        let event = topic("t").with_room_id(RoomId::from("!elsewhere:x"));

        assert!(rooms.apply(&partition, &event));
        assert!(rooms.get(&partition).is_some());
        assert!(rooms.get(&RoomId::from("!elsewhere:x")).is_none());
    }

    #[test]
    fn room_states_skip_non_state_without_creating_room() {
        let mut rooms = RoomStates::new();
        let msg = Event::message("m.room.message", "@a:x", json!({}));
        assert!(!rooms.apply(&RoomId::from("!r:x"), &msg));
        assert!(rooms.is_empty());
    }

    #[test]
    fn replay_converges() {
        let room = RoomId::from("!r:x");
        let events = vec![topic("a"), topic("b")];

        let mut once = RoomStates::new();
        events.iter().for_each(|e| {
            once.apply(&room, e);
        });
        let mut twice = once.clone();
        events.iter().for_each(|e| {
            twice.apply(&room, e);
        });

        assert_eq!(once, twice);
    }
}
