//! # sync-types
//!
//! Wire format types for the roomsync incremental sync processor.
//!
//! This crate provides the foundational types used across all roomsync crates:
//! - [`RoomId`] - Room identity
//! - [`Event`] - A decoded protocol event
//! - [`SyncResponse`] - One sync delta, partitioned into joined/invited/left rooms
//! - [`SyncCursor`] - The persisted resumption cursor
//! - [`Filter`] - The server-side filter uploaded before the first sync
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cursor;
mod error;
mod event;
mod filter;
mod ids;
mod response;

pub use cursor::SyncCursor;
pub use error::TypesError;
pub use event::Event;
pub use filter::{Filter, RoomFilter, TimelineFilter, DEFAULT_TIMELINE_LIMIT};
pub use ids::RoomId;
pub use response::{EventBatch, InvitedRoom, JoinedRoom, LeftRoom, RawEvent, Rooms, SyncResponse};
