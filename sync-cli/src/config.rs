//! Configuration loading for roomsync-cli.
//!
//! Configuration is loaded from a TOML file (default: `roomsync.toml` in the
//! data directory). Every field has a default, so a missing file or section
//! is fine.

use roomsync_client::{BackoffStrategy, SinkPolicy, SyncConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for roomsync-cli.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Sync request configuration.
    pub sync: SyncSection,
    /// Event sink configuration.
    pub sink: SinkSection,
    /// Failed-sync backoff configuration.
    pub backoff: BackoffSection,
    /// Cursor store configuration.
    pub store: StoreSection,
}

/// Sync request configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SyncSection {
    /// Timeline events per room per response (default: 50).
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: u32,
    /// Long-poll timeout in milliseconds (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Event sink configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SinkSection {
    /// Channel capacity (default: 64).
    #[serde(default = "default_sink_capacity")]
    pub capacity: usize,
    /// Full-queue policy (default: block).
    #[serde(default)]
    pub policy: SinkPolicy,
}

/// Backoff strategy name.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Doubling delay with jitter.
    Exponential,
}

/// Failed-sync backoff configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BackoffSection {
    /// Strategy (default: fixed).
    #[serde(default)]
    pub strategy: StrategyName,
    /// Fixed delay, or first exponential delay, in seconds (default: 10).
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// Exponential upper bound in seconds (default: 300).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

/// Cursor store configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreSection {
    /// Cursor file; relative paths resolve against the data directory.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_timeline_limit() -> u32 {
    roomsync_types::DEFAULT_TIMELINE_LIMIT
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_sink_capacity() -> usize {
    roomsync_client::DEFAULT_SINK_CAPACITY
}

fn default_delay_secs() -> u64 {
    10
}

fn default_max_delay_secs() -> u64 {
    300 // 5 minutes
}

fn default_store_path() -> PathBuf {
    PathBuf::from("cursor.json")
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            timeline_limit: default_timeline_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            capacity: default_sink_capacity(),
            policy: SinkPolicy::default(),
        }
    }
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            strategy: StrategyName::default(),
            delay_secs: default_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if given, else `roomsync.toml` in `data_dir` if it exists,
    /// else defaults.
    pub fn load(path: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = data_dir.join("roomsync.toml");
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Engine configuration.
    pub fn sync_config(&self) -> SyncConfig {
        let backoff = match self.backoff.strategy {
            StrategyName::Fixed => BackoffStrategy::Fixed {
                delay: Duration::from_secs(self.backoff.delay_secs),
            },
            StrategyName::Exponential => BackoffStrategy::Exponential {
                base: Duration::from_secs(self.backoff.delay_secs),
                max: Duration::from_secs(self.backoff.max_delay_secs),
            },
        };
        SyncConfig::new()
            .with_timeline_limit(self.sync.timeline_limit)
            .with_timeout(Duration::from_millis(self.sync.timeout_ms))
            .with_sink(self.sink.capacity, self.sink.policy)
            .with_backoff(backoff)
    }

    /// Cursor file location.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            data_dir.join(&self.store.path)
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
