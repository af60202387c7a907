//! Repository gateway used by the committers
//!
//! The pipeline only needs two operations: insert an ordered, non-empty batch
//! of records, and read back the earliest and latest insertion time of a run.
//! [`PgMatchRepository`] backs them with PostgreSQL; [`MemoryMatchRepository`]
//! keeps everything in process and can inject failures.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{MatchRecord, RunTimestamps};

pub mod memory;
pub mod postgres;

pub use memory::MemoryMatchRepository;
pub use postgres::PgMatchRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: String },

    #[error("Insert rejected: {0}")]
    Rejected(String),
}

/// Durable storage for match records
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Insert `records` in order.
    ///
    /// On error nothing, or an unspecified prefix of the batch, may have been
    /// stored. Implementations must tolerate concurrent calls.
    async fn insert_batch(&self, records: &[MatchRecord]) -> Result<(), RepositoryError>;

    /// Earliest and latest `inserted_at` stored for `run_id`; both absent for
    /// an unknown run
    async fn query_timestamps(&self, run_id: &str) -> Result<RunTimestamps, RepositoryError>;

    /// Cheap liveness check for the backing store
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
