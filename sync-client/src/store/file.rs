//! File-backed cursor store.
//!
//! The cursor is kept as a small JSON record
//! (`{"filter_id": "...", "next_batch": "..."}`). Writes go to a temporary
//! sibling file which is then renamed over the record, so a crash mid-write
//! leaves the previous cursor intact.

use super::{CursorStore, StoreError};
use async_trait::async_trait;
use roomsync_types::SyncCursor;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Cursor store persisted to a JSON file.
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    cursor: Mutex<SyncCursor>,
}

impl FileCursorStore {
    /// Open the store at `path`, loading the existing record if present.
    ///
    /// A missing file yields a bootstrap cursor; it is created on first save.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cursor = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SyncCursor::default(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), next_batch = %cursor.next_batch, "Opened cursor store");
        Ok(Self {
            path,
            cursor: Mutex::new(cursor),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a copy of the current cursor.
    pub async fn snapshot(&self) -> SyncCursor {
        self.cursor.lock().await.clone()
    }

    /// Reset to a bootstrap cursor and persist it.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut cursor = self.cursor.lock().await;
        *cursor = SyncCursor::default();
        self.persist(&cursor).await
    }

    async fn persist(&self, cursor: &SyncCursor) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(cursor).map_err(StoreError::Serialization)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(parent, source))?;
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|source| self.io_error(&tmp, source))?;
        set_file_permissions_0600(&tmp)
            .await
            .map_err(|source| self.io_error(&tmp, source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(&self.path, source))?;
        Ok(())
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn save_filter_id(&self, filter_id: &str) -> Result<(), StoreError> {
        let mut cursor = self.cursor.lock().await;
        let updated = SyncCursor::new(filter_id, cursor.next_batch.clone());
        self.persist(&updated).await?;
        *cursor = updated;
        Ok(())
    }

    async fn load_filter_id(&self) -> Result<String, StoreError> {
        Ok(self.cursor.lock().await.filter_id.clone())
    }

    async fn save_next_batch(&self, next_batch: &str) -> Result<(), StoreError> {
        let mut cursor = self.cursor.lock().await;
        let updated = cursor.advanced(next_batch);
        self.persist(&updated).await?;
        *cursor = updated;
        Ok(())
    }

    async fn load_next_batch(&self) -> Result<String, StoreError> {
        Ok(self.cursor.lock().await.next_batch.clone())
    }
}

/// Set file permissions to 0600 (owner only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
