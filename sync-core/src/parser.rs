//! Per-event decoding.
//!
//! Events arrive as raw JSON inside a sync response. Each one is decoded on
//! its own so that a single malformed payload costs exactly one event, never
//! the batch around it.

use roomsync_types::{Event, RoomId};
use serde_json::value::RawValue;
use thiserror::Error;

/// A raw payload that could not be decoded into an [`Event`].
///
/// Carries the raw text so the diagnostic can show exactly what the server
/// sent.
#[derive(Debug, Error)]
#[error("failed to decode event in {room_id}: {source}")]
pub struct ParseFailure {
    /// Room partition the payload came from.
    pub room_id: RoomId,
    /// The raw payload text.
    pub raw: String,
    /// Underlying decode error.
    #[source]
    pub source: serde_json::Error,
}

/// Decode one raw payload from the room `room_id`.
///
/// If the payload has no `room_id` of its own, the partition's room id is
/// filled in. A payload that names a room keeps it; callers that must force
/// the partition id (left rooms) do so themselves.
pub fn parse_event(room_id: &RoomId, raw: &RawValue) -> Result<Event, ParseFailure> {
    let mut event: Event = serde_json::from_str(raw.get()).map_err(|source| ParseFailure {
        room_id: room_id.clone(),
        raw: raw.get().to_string(),
        source,
    })?;

    if event.room_id.as_ref().map_or(true, RoomId::is_empty) {
        event.room_id = Some(room_id.clone());
    }
    Ok(event)
}
