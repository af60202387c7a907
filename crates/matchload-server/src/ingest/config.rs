//! Ingestion configuration
//!
//! Commit tuning and the directory that HTTP-triggered runs read from.

use matchload_common::MatchloadError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use super::batched::DEFAULT_BATCH_SIZE;
use super::ordered::DEFAULT_ORDERED_TIMEOUT;

/// Default directory for input files
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Root directory that `fileName` parameters are resolved against
    pub data_dir: PathBuf,
    /// Records per kind-A insert
    pub batch_size: usize,
    /// Kind-A groups committed at once
    pub batched_concurrency: usize,
    /// Kind-B matches committed at once
    pub ordered_concurrency: usize,
    /// Upper bound on the whole kind-B phase
    pub ordered_timeout_secs: u64,
}

fn parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// max(1, parallelism / 2)
pub fn default_batched_concurrency() -> usize {
    (parallelism() / 2).max(1)
}

/// 2 × parallelism
pub fn default_ordered_concurrency() -> usize {
    parallelism() * 2
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            batched_concurrency: default_batched_concurrency(),
            ordered_concurrency: default_ordered_concurrency(),
            ordered_timeout_secs: DEFAULT_ORDERED_TIMEOUT.as_secs(),
        }
    }
}

impl IngestConfig {
    /// Load from INGEST_* environment variables, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            data_dir: std::env::var("INGEST_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            batch_size: std::env::var("INGEST_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            batched_concurrency: std::env::var("INGEST_BATCHED_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batched_concurrency),
            ordered_concurrency: std::env::var("INGEST_ORDERED_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ordered_concurrency),
            ordered_timeout_secs: std::env::var("INGEST_ORDERED_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ordered_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("Ingest batch_size must be greater than 0");
        }
        if self.batched_concurrency == 0 || self.ordered_concurrency == 0 {
            anyhow::bail!("Ingest concurrency must be greater than 0");
        }
        if self.ordered_timeout_secs == 0 {
            anyhow::bail!("Ingest ordered_timeout_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn ordered_timeout(&self) -> Duration {
        Duration::from_secs(self.ordered_timeout_secs)
    }

    /// Resolve a caller-supplied file name inside `data_dir`.
    ///
    /// Only plain relative paths are accepted; `..`, absolute paths and drive
    /// prefixes are rejected before touching the filesystem.
    pub async fn resolve_source(&self, file_name: &str) -> Result<PathBuf, MatchloadError> {
        let trimmed = file_name.trim();
        if trimmed.is_empty() {
            return Err(MatchloadError::InvalidSourcePath("file name is empty".to_string()));
        }

        let relative = Path::new(trimmed);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(MatchloadError::InvalidSourcePath(trimmed.to_string()));
        }

        let path = self.data_dir.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(MatchloadError::SourceNotFound(trimmed.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MatchloadError::SourceNotFound(trimmed.to_string()))
            },
            Err(e) => Err(MatchloadError::Io(e)),
        }
    }
}
