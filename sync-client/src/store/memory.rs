//! In-process cursor store.

use super::{CursorStore, StoreError};
use async_trait::async_trait;
use roomsync_types::SyncCursor;
use tokio::sync::Mutex;

/// Cursor store that keeps the cursor in process memory.
///
/// Progress is lost on restart, which means the next run bootstraps again
/// and discards its first response.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<SyncCursor>,
}

impl MemoryCursorStore {
    /// Create an empty store (bootstrap cursor).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with `cursor`.
    pub fn with_cursor(cursor: SyncCursor) -> Self {
        Self {
            cursor: Mutex::new(cursor),
        }
    }

    /// Get a copy of the current cursor.
    pub async fn snapshot(&self) -> SyncCursor {
        self.cursor.lock().await.clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn save_filter_id(&self, filter_id: &str) -> Result<(), StoreError> {
        self.cursor.lock().await.filter_id = filter_id.to_string();
        Ok(())
    }

    async fn load_filter_id(&self) -> Result<String, StoreError> {
        Ok(self.cursor.lock().await.filter_id.clone())
    }

    async fn save_next_batch(&self, next_batch: &str) -> Result<(), StoreError> {
        self.cursor.lock().await.next_batch = next_batch.to_string();
        Ok(())
    }

    async fn load_next_batch(&self) -> Result<String, StoreError> {
        Ok(self.cursor.lock().await.next_batch.clone())
    }
}
