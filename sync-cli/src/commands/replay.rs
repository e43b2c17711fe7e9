//! Replay recorded sync responses through the engine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use roomsync_client::{
    CursorStore, FileCursorStore, SyncEngine, SyncRequest, SyncTransport, TransportError,
};
use roomsync_types::{Filter, SyncResponse};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::config::CliConfig;

/// Transport that serves a fixed list of recorded responses.
///
/// Once the recording is exhausted, `sync()` signals [`exhausted`] and then
/// waits forever, like an idle long-poll, until the engine is stopped.
///
/// [`exhausted`]: ReplayTransport::exhausted
#[derive(Debug)]
pub struct ReplayTransport {
    responses: Mutex<VecDeque<SyncResponse>>,
    exhausted: Arc<Notify>,
}

impl ReplayTransport {
    /// Serve `responses` in order.
    pub fn new(responses: Vec<SyncResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            exhausted: Arc::new(Notify::new()),
        }
    }

    /// Load a recording: a directory of `*.json` files (sorted by file name)
    /// or a single newline-delimited JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Recording not found: {}", path.display()))?;

        let responses = if metadata.is_dir() {
            load_dir(path).await?
        } else {
            load_ndjson(path).await?
        };
        tracing::info!(path = %path.display(), responses = responses.len(), "Loaded recording");
        Ok(Self::new(responses))
    }

    /// Notified once the last recorded response has been served.
    pub fn exhausted(&self) -> Arc<Notify> {
        Arc::clone(&self.exhausted)
    }

    /// Responses not yet served.
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

async fn load_dir(dir: &Path) -> Result<Vec<SyncResponse>> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut responses = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let response = SyncResponse::from_slice(&bytes)
            .with_context(|| format!("Invalid sync response in {}", file.display()))?;
        responses.push(response);
    }
    Ok(responses)
}

async fn load_ndjson(file: &Path) -> Result<Vec<SyncResponse>> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            SyncResponse::from_json(line)
                .with_context(|| format!("Invalid sync response at {}:{}", file.display(), i + 1))
        })
        .collect()
}

#[async_trait]
impl SyncTransport for ReplayTransport {
    async fn create_filter(&self, filter: &Filter) -> Result<String, TransportError> {
        tracing::debug!(limit = filter.timeline_limit(), "Replay filter accepted");
        Ok("replay".to_string())
    }

    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let next = self
            .responses
            .lock()
            .map_err(|_| TransportError::Closed)?
            .pop_front();

        match next {
            Some(response) => {
                tracing::debug!(since = ?request.since, next_batch = %response.next_batch, "Replaying response");
                Ok(response)
            }
            None => {
                self.exhausted.notify_one();
                std::future::pending::<()>().await;
                Err(TransportError::Closed)
            }
        }
    }
}

/// Run the replay command.
pub async fn run(
    config: &CliConfig,
    data_dir: &Path,
    recording: &Path,
    since: Option<&str>,
) -> Result<()> {
    let transport = ReplayTransport::load(recording).await?;
    let exhausted = transport.exhausted();

    let store_path = config.store_path(data_dir);
    let store = FileCursorStore::open(&store_path)
        .await
        .with_context(|| format!("Failed to open cursor store {}", store_path.display()))?;
    if let Some(since) = since {
        if store.load_next_batch().await?.is_empty() {
            store.save_next_batch(since).await?;
        }
    }

    let sync_config = config.sync_config();
    let (sink, mut events) = sync_config.event_channel();
    let mut engine = SyncEngine::new(sync_config, transport, store, sink);

    let stop = engine.stop_handle();
    tokio::spawn(async move {
        exhausted.notified().await;
        stop.stop();
    });
    let stop = engine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping");
            stop.stop();
        }
    });

    let printer = tokio::spawn(async move {
        let mut printed = 0usize;
        while let Some(event) = events.recv().await {
            let line = serde_json::to_string(&event)?;
            writeln!(std::io::stdout(), "{}", line)?;
            printed += 1;
        }
        anyhow::Ok(printed)
    });

    engine.run().await.context("Sync engine failed")?;

    let cursor = engine.store().snapshot().await;
    let rooms = engine.processor().rooms().len();
    let unplayed = engine.transport().remaining();
    drop(engine);
    let printed = printer.await.context("Event printer panicked")??;

    tracing::info!(
        events = printed,
        rooms,
        unplayed,
        next_batch = %cursor.next_batch,
        "Replay finished"
    );
    Ok(())
}
