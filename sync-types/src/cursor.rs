//! The persisted resumption cursor.

use serde::{Deserialize, Serialize};

/// Resumption cursor: the uploaded filter id plus the last `next_batch`
/// token handed out by the remote service.
///
/// An empty `next_batch` means no sync has completed yet. The first
/// response fetched in that state is a full historical snapshot rather than
/// a delta.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Server-side filter id ("" if none uploaded yet).
    #[serde(default)]
    pub filter_id: String,
    /// Opaque resumption token ("" before the first sync).
    #[serde(default)]
    pub next_batch: String,
}

impl SyncCursor {
    /// Create a cursor from its two fields.
    pub fn new(filter_id: impl Into<String>, next_batch: impl Into<String>) -> Self {
        Self {
            filter_id: filter_id.into(),
            next_batch: next_batch.into(),
        }
    }

    /// True when no prior sync has completed.
    pub fn is_bootstrap(&self) -> bool {
        self.next_batch.is_empty()
    }

    /// The `since` value to send on the next request, if any.
    pub fn since(&self) -> Option<&str> {
        if self.is_bootstrap() {
            None
        } else {
            Some(&self.next_batch)
        }
    }

    /// Return the cursor advanced to `next_batch`.
    pub fn advanced(&self, next_batch: &str) -> Self {
        Self {
            filter_id: self.filter_id.clone(),
            next_batch: next_batch.to_string(),
        }
    }
}
