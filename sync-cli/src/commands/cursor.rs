//! Show or clear the persisted cursor.

use anyhow::{Context, Result};
use roomsync_client::FileCursorStore;
use std::path::Path;

use crate::config::CliConfig;

/// Run the cursor command.
pub async fn run(config: &CliConfig, data_dir: &Path, reset: bool) -> Result<()> {
    let path = config.store_path(data_dir);
    let store = FileCursorStore::open(&path)
        .await
        .with_context(|| format!("Failed to open cursor store {}", path.display()))?;

    if reset {
        store.reset().await.context("Failed to reset cursor")?;
        println!("Cursor reset: next sync will bootstrap.");
        return Ok(());
    }

    let cursor = store.snapshot().await;
    println!("Cursor store: {}", path.display());
    println!("  Filter ID:  {}", display_or_none(&cursor.filter_id));
    println!("  Next batch: {}", display_or_none(&cursor.next_batch));
    if cursor.is_bootstrap() {
        println!();
        println!("No sync position yet; the next response is a bootstrap snapshot.");
    }
    Ok(())
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}
