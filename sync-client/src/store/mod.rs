//! Cursor storage for roomsync.
//!
//! Only the resumption cursor (filter id + next batch token) is persisted.
//! Room objects are deliberately not stored: room state is rebuilt from
//! replaying sync, so `save_room` is a no-op and `load_room` never finds
//! anything.

mod file;
mod memory;

pub use file::FileCursorStore;
pub use memory::MemoryCursorStore;

use async_trait::async_trait;
use roomsync_core::Room;
use roomsync_types::{RoomId, SyncCursor};
use std::path::PathBuf;
use thiserror::Error;

/// Cursor store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The persisted record could not be decoded.
    #[error("corrupt cursor record {path}: {source}")]
    Corrupt {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// Encoding the record failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The backing store is unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for cursor storage backends.
///
/// A single global cursor: no per-room or per-account partitioning.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Persist the server-side filter id.
    async fn save_filter_id(&self, filter_id: &str) -> Result<(), StoreError>;

    /// Load the filter id ("" if none saved).
    async fn load_filter_id(&self) -> Result<String, StoreError>;

    /// Persist the next batch token.
    async fn save_next_batch(&self, next_batch: &str) -> Result<(), StoreError>;

    /// Load the next batch token ("" before the first sync).
    async fn load_next_batch(&self) -> Result<String, StoreError>;

    /// Rooms are not persisted; this does nothing.
    async fn save_room(&self, _room: &Room) -> Result<(), StoreError> {
        Ok(())
    }

    /// Rooms are not persisted; this always returns `None`.
    async fn load_room(&self, _room_id: &RoomId) -> Result<Option<Room>, StoreError> {
        Ok(None)
    }

    /// Load both fields as a [`SyncCursor`].
    async fn load_cursor(&self) -> Result<SyncCursor, StoreError> {
        let filter_id = self.load_filter_id().await?;
        let next_batch = self.load_next_batch().await?;
        Ok(SyncCursor::new(filter_id, next_batch))
    }
}
