//! Kind-A committer
//!
//! Each match group is one unit of work. Groups run concurrently through
//! `buffer_unordered`; inside a group records are flushed in sequence order,
//! `batch_size` at a time. The first failed flush abandons the group: earlier
//! batches stay committed and nothing is retried.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::models::MatchGroup;
use super::report::{CommitSummary, GroupOutcome, GroupStatus};
use super::repository::MatchRepository;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct BatchedCommitter {
    repository: Arc<dyn MatchRepository>,
    batch_size: usize,
    concurrency: usize,
}

impl BatchedCommitter {
    /// Zero values are raised to 1
    pub fn new(repository: Arc<dyn MatchRepository>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            repository,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Commit every group and wait for all of them to finish
    pub async fn commit(&self, groups: Vec<MatchGroup>, cancel: CancellationToken) -> CommitSummary {
        info!(
            groups = groups.len(),
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            "Committing kind-A groups"
        );

        let outcomes: Vec<GroupOutcome> = stream::iter(groups)
            .map(|group| self.commit_group(group, &cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let summary = CommitSummary::from_outcomes(outcomes);
        info!(
            committed = summary.groups_committed,
            failed = summary.groups_failed,
            incomplete = summary.groups_incomplete,
            records = summary.records_committed,
            "Kind-A commit finished"
        );
        summary
    }

    async fn commit_group(&self, group: MatchGroup, cancel: &CancellationToken) -> GroupOutcome {
        let mut outcome = GroupOutcome {
            match_id: group.match_id,
            kind: group.kind,
            total: group.records.len(),
            committed: 0,
            inserts: 0,
            status: GroupStatus::Committed,
        };

        for batch in group.records.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                warn!(
                    match_id = %outcome.match_id,
                    committed = outcome.committed,
                    total = outcome.total,
                    "Kind-A group cancelled"
                );
                outcome.status = GroupStatus::Incomplete;
                return outcome;
            }

            match self.repository.insert_batch(batch).await {
                Ok(()) => {
                    outcome.committed += batch.len();
                    outcome.inserts += 1;
                    debug!(
                        match_id = %outcome.match_id,
                        batch_size = batch.len(),
                        committed = outcome.committed,
                        "Flushed kind-A batch"
                    );
                },
                Err(e) => {
                    let at_sequence = batch[0].sequence_number;
                    error!(
                        match_id = %outcome.match_id,
                        sequence_number = at_sequence,
                        batch_size = batch.len(),
                        error = %e,
                        "Kind-A batch failed, abandoning group"
                    );
                    outcome.status = GroupStatus::Failed {
                        at_sequence,
                        error: e.to_string(),
                    };
                    return outcome;
                },
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::models::{MatchRecord, RecordKind, RunId};
    use crate::ingest::repository::MemoryMatchRepository;
    use crate::ingest::sequencer::assign_sequences;
    use chrono::Utc;

    fn kind_a(match_id: &str, count: usize) -> Vec<MatchRecord> {
        (0..count)
            .map(|i| {
                MatchRecord::new(match_id, 1, format!("o{i}"), Some("s".into()), Utc::now(), RunId::new(1))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_flushes_full_batches_then_remainder() {
        let repo = Arc::new(MemoryMatchRepository::new());
        let run = assign_sequences(kind_a("M1", 2500));
        let committer = BatchedCommitter::new(repo.clone(), 1000, 2);

        let summary = committer.commit(run.a_groups, CancellationToken::new()).await;

        assert!(summary.is_complete());
        assert_eq!(summary.inserts, 3);
        assert_eq!(summary.records_committed, 2500);

        let sizes: Vec<usize> = repo.committed_batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(
            repo.committed_sequence("M1", RecordKind::A),
            (1..=2500).collect::<Vec<u32>>()
        );
    }

    #[tokio::test]
    async fn test_failure_abandons_only_that_group() {
        let repo = Arc::new(
            MemoryMatchRepository::new()
                .failing_when(|r| r.match_id == "M2" && r.sequence_number == 4),
        );
        let mut records = kind_a("M1", 5);
        records.extend(kind_a("M2", 5));
        let run = assign_sequences(records);
        let committer = BatchedCommitter::new(repo.clone(), 2, 4);

        let summary = committer.commit(run.a_groups, CancellationToken::new()).await;

        assert_eq!(summary.groups_committed, 1);
        assert_eq!(summary.groups_failed, 1);
        assert_eq!(repo.committed_sequence("M1", RecordKind::A), vec![1, 2, 3, 4, 5]);
        // Batch [1,2] landed, [3,4] failed, [5] was never sent
        assert_eq!(repo.committed_sequence("M2", RecordKind::A), vec![1, 2]);
        assert_eq!(repo.attempted_sequence("M2", RecordKind::A), vec![1, 2, 3, 4]);

        let failed = summary.outcome_for("M2").unwrap();
        assert_eq!(failed.committed, 2);
        assert!(matches!(failed.status, GroupStatus::Failed { at_sequence: 3, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_is_incomplete() {
        let repo = Arc::new(MemoryMatchRepository::new());
        let run = assign_sequences(kind_a("M1", 3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = BatchedCommitter::new(repo.clone(), 10, 1).commit(run.a_groups, cancel).await;

        assert_eq!(summary.groups_incomplete, 1);
        assert_eq!(repo.row_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_settings_are_raised() {
        let committer = BatchedCommitter::new(Arc::new(MemoryMatchRepository::new()), 0, 0);
        assert_eq!(committer.batch_size(), 1);
        assert_eq!(committer.concurrency(), 1);
    }
}
