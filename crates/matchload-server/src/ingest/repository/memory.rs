//! In-process repository
//!
//! Stores rows in memory and records every insert call, which makes commit
//! order and batch boundaries observable. A predicate can be installed to
//! reject any batch containing a matching record. Backs the CLI `--dry-run`
//! mode and the pipeline tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use super::{MatchRepository, RepositoryError};
use crate::ingest::models::{MatchRecord, RecordKind, RunTimestamps};

type FailurePredicate = Box<dyn Fn(&MatchRecord) -> bool + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    rows: Vec<MatchRecord>,
    /// Every call, successful or not, in call order
    attempts: Vec<Vec<MatchRecord>>,
    /// Successful calls only
    committed_batches: Vec<Vec<MatchRecord>>,
}

#[derive(Default)]
pub struct MemoryMatchRepository {
    state: Mutex<MemoryState>,
    fail_when: Option<FailurePredicate>,
    insert_delay: Option<Duration>,
}

impl MemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any batch containing a record for which `predicate` holds
    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MatchRecord) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Sleep before each insert completes
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    pub fn rows(&self) -> Vec<MatchRecord> {
        self.state.lock().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len()
    }

    pub fn attempts(&self) -> Vec<Vec<MatchRecord>> {
        self.state.lock().attempts.clone()
    }

    pub fn committed_batches(&self) -> Vec<Vec<MatchRecord>> {
        self.state.lock().committed_batches.clone()
    }

    /// Sequence numbers stored for (match_id, kind), in commit order
    pub fn committed_sequence(&self, match_id: &str, kind: RecordKind) -> Vec<u32> {
        self.state
            .lock()
            .rows
            .iter()
            .filter(|r| r.match_id == match_id && r.kind == kind)
            .map(|r| r.sequence_number)
            .collect()
    }

    /// Sequence numbers ever sent for (match_id, kind), including failed ones
    pub fn attempted_sequence(&self, match_id: &str, kind: RecordKind) -> Vec<u32> {
        self.state
            .lock()
            .attempts
            .iter()
            .flatten()
            .filter(|r| r.match_id == match_id && r.kind == kind)
            .map(|r| r.sequence_number)
            .collect()
    }
}

#[async_trait]
impl MatchRepository for MemoryMatchRepository {
    async fn insert_batch(&self, records: &[MatchRecord]) -> Result<(), RepositoryError> {
        self.state.lock().attempts.push(records.to_vec());

        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref predicate) = self.fail_when {
            if let Some(bad) = records.iter().find(|&r| predicate(r)) {
                return Err(RepositoryError::Rejected(format!(
                    "match {} sequence {}",
                    bad.match_id, bad.sequence_number
                )));
            }
        }

        let mut state = self.state.lock();
        state.rows.extend_from_slice(records);
        state.committed_batches.push(records.to_vec());
        Ok(())
    }

    async fn query_timestamps(&self, run_id: &str) -> Result<RunTimestamps, RepositoryError> {
        let state = self.state.lock();
        let stamps = state.rows.iter().filter(|r| r.run_id == run_id).map(|r| r.inserted_at);

        Ok(RunTimestamps {
            min_inserted_at: stamps.clone().min(),
            max_inserted_at: stamps.max(),
        })
    }
}
