//! Kind-B committer with strict per-match ordering
//!
//! Each match group is one unit of work, and up to `concurrency` groups run at
//! once through `buffer_unordered`. Inside a group every record is its own
//! insert: the task waits on the match's
//! [`SequenceGate`](super::gate::SequenceGate) for the record's turn, inserts,
//! then advances the gate.
//!
//! A failed insert closes the match's gate and ends the group; later
//! sequences are never attempted. The whole drain runs under a hard timeout.
//! When it elapses the run token is cancelled, every gate is closed and
//! unfinished groups are reported as incomplete. Progress is recorded per
//! group as it happens, so work committed before the timeout is still
//! counted.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::gate::GateRegistry;
use super::models::MatchGroup;
use super::report::{CommitSummary, GroupOutcome, GroupStatus};
use super::repository::MatchRepository;

pub const DEFAULT_ORDERED_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct OrderedCommitter {
    repository: Arc<dyn MatchRepository>,
    concurrency: usize,
    timeout: Duration,
}

impl OrderedCommitter {
    /// `concurrency` is the number of match groups committed at once
    pub fn new(repository: Arc<dyn MatchRepository>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            repository,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Commit every group, waiting at most the configured timeout
    pub async fn commit(&self, groups: Vec<MatchGroup>, cancel: CancellationToken) -> CommitSummary {
        let progress: Vec<Mutex<GroupOutcome>> = groups
            .iter()
            .map(|g| {
                Mutex::new(GroupOutcome {
                    match_id: g.match_id.clone(),
                    kind: g.kind,
                    total: g.records.len(),
                    committed: 0,
                    inserts: 0,
                    status: GroupStatus::Committed,
                })
            })
            .collect();

        info!(
            groups = groups.len(),
            records = groups.iter().map(MatchGroup::len).sum::<usize>(),
            concurrency = self.concurrency,
            timeout_secs = self.timeout.as_secs(),
            "Committing kind-B groups"
        );

        let registry = Arc::new(GateRegistry::new());
        let run_cancel = cancel.child_token();

        let drain: futures::future::BoxFuture<'_, ()> = stream::iter(groups.into_iter().zip(progress.iter()))
            .map(|(group, outcome)| self.commit_group(group, outcome, &registry, &run_cancel))
            .buffer_unordered(self.concurrency)
            .collect::<()>()
            .boxed();

        if tokio::time::timeout(self.timeout, drain).await.is_err() {
            run_cancel.cancel();
            let closed = registry.close_all();
            warn!(
                timeout_secs = self.timeout.as_secs(),
                open_gates = closed,
                "Kind-B commit timed out, cancelling outstanding work"
            );
        }

        let outcomes = progress.into_iter().map(|slot| {
            let mut outcome = slot.into_inner();
            if outcome.is_committed() && outcome.committed < outcome.total {
                outcome.status = GroupStatus::Incomplete;
            }
            outcome
        });

        let summary = CommitSummary::from_outcomes(outcomes);
        info!(
            committed = summary.groups_committed,
            failed = summary.groups_failed,
            incomplete = summary.groups_incomplete,
            records = summary.records_committed,
            "Kind-B commit finished"
        );
        summary
    }

    async fn commit_group(
        &self,
        group: MatchGroup,
        outcome: &Mutex<GroupOutcome>,
        registry: &Arc<GateRegistry>,
        cancel: &CancellationToken,
    ) {
        let lease = registry.lease(&group.match_id);
        let gate = lease.gate();

        for record in &group.records {
            let sequence = record.sequence_number;

            if let Err(e) = gate.wait_for_turn(sequence, cancel).await {
                debug!(match_id = %group.match_id, sequence_number = sequence, reason = %e, "Kind-B group stopped");
                return;
            }

            match self.repository.insert_batch(std::slice::from_ref(record)).await {
                Ok(()) => {
                    gate.advance(sequence);
                    {
                        let mut outcome = outcome.lock();
                        outcome.committed += 1;
                        outcome.inserts += 1;
                    }
                    debug!(match_id = %group.match_id, sequence_number = sequence, "Committed kind-B record");
                },
                Err(e) => {
                    error!(
                        match_id = %group.match_id,
                        sequence_number = sequence,
                        error = %e,
                        "Kind-B insert failed, stopping match"
                    );
                    gate.close();
                    outcome.lock().status = GroupStatus::Failed {
                        at_sequence: sequence,
                        error: e.to_string(),
                    };
                    return;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::models::{MatchRecord, RecordKind, RunId};
    use crate::ingest::repository::MemoryMatchRepository;
    use crate::ingest::sequencer::assign_sequences;
    use chrono::Utc;

    fn kind_b(match_id: &str, count: usize) -> Vec<MatchRecord> {
        (0..count)
            .map(|i| MatchRecord::new(match_id, 1, format!("o{i}"), None, Utc::now(), RunId::new(7)))
            .collect()
    }

    fn committer(repo: Arc<MemoryMatchRepository>, concurrency: usize) -> OrderedCommitter {
        OrderedCommitter::new(repo, concurrency, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_each_match_commits_in_ascending_order() {
        let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(1)));
        let mut records = kind_b("M1", 20);
        records.extend(kind_b("M2", 15));
        records.extend(kind_b("M3", 1));
        let run = assign_sequences(records);

        let summary = committer(repo.clone(), 8).commit(run.b_groups, CancellationToken::new()).await;

        assert!(summary.is_complete());
        assert_eq!(summary.groups_committed, 3);
        assert_eq!(summary.inserts, 36);
        assert!(repo.committed_batches().iter().all(|b| b.len() == 1));
        assert_eq!(repo.committed_sequence("M1", RecordKind::B), (1..=20).collect::<Vec<u32>>());
        assert_eq!(repo.committed_sequence("M2", RecordKind::B), (1..=15).collect::<Vec<u32>>());
        assert_eq!(repo.committed_sequence("M3", RecordKind::B), vec![1]);
    }

    #[tokio::test]
    async fn test_single_slot_still_finishes() {
        let repo = Arc::new(MemoryMatchRepository::new());
        let mut records = kind_b("M1", 4);
        records.extend(kind_b("M2", 4));
        let run = assign_sequences(records);

        let summary = committer(repo.clone(), 1).commit(run.b_groups, CancellationToken::new()).await;

        assert!(summary.is_complete());
        assert_eq!(repo.row_count(), 8);
    }

    #[tokio::test]
    async fn test_failure_stops_match_and_spares_others() {
        let repo = Arc::new(
            MemoryMatchRepository::new()
                .failing_when(|r| r.match_id == "M2" && r.sequence_number == 2),
        );
        let mut records = kind_b("M1", 5);
        records.extend(kind_b("M2", 5));
        let run = assign_sequences(records);

        let summary = committer(repo.clone(), 6).commit(run.b_groups, CancellationToken::new()).await;

        assert_eq!(summary.groups_committed, 1);
        assert_eq!(summary.groups_failed, 1);
        assert_eq!(repo.committed_sequence("M1", RecordKind::B), vec![1, 2, 3, 4, 5]);
        assert_eq!(repo.committed_sequence("M2", RecordKind::B), vec![1]);
        // 3..=5 never reached the repository
        assert_eq!(repo.attempted_sequence("M2", RecordKind::B), vec![1, 2]);

        let failed = summary.outcome_for("M2").unwrap();
        assert_eq!(failed.committed, 1);
        assert!(matches!(failed.status, GroupStatus::Failed { at_sequence: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_matches_commit_side_by_side() {
        let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(10)));
        let mut records = kind_b("M1", 20);
        records.extend(kind_b("M2", 20));
        records.extend(kind_b("M3", 20));
        let run = assign_sequences(records);

        let summary = committer(repo.clone(), 4).commit(run.b_groups, CancellationToken::new()).await;
        assert!(summary.is_complete());

        let attempts: Vec<String> = repo
            .attempts()
            .iter()
            .map(|batch| batch[0].match_id.clone())
            .collect();
        let first_other = attempts.iter().position(|m| m != "M1").unwrap();
        let m1_before = attempts[..first_other].iter().filter(|m| *m == "M1").count();
        assert!(m1_before <= 1, "M1 attempted {} records before any other match", m1_before);

        // Three matches in parallel, each 20 inserts of 10ms
        let last_started = ["M1", "M2", "M3"]
            .iter()
            .map(|m| attempts.iter().position(|a| a == m).unwrap())
            .max()
            .unwrap();
        assert!(last_started < 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_slot_runs_matches_in_turn() {
        let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(10)));
        let mut records = kind_b("M1", 3);
        records.extend(kind_b("M2", 3));
        let run = assign_sequences(records);

        committer(repo.clone(), 1).commit(run.b_groups, CancellationToken::new()).await;

        let order: Vec<(String, u32)> = repo
            .attempts()
            .iter()
            .map(|batch| (batch[0].match_id.clone(), batch[0].sequence_number))
            .collect();
        let expected: Vec<(String, u32)> = ["M1", "M2"]
            .iter()
            .flat_map(|m| (1..=3).map(move |seq| (m.to_string(), seq)))
            .collect();
        assert_eq!(order, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_incomplete_groups() {
        let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(50)));
        let run = assign_sequences(kind_b("M1", 10));
        let committer = OrderedCommitter::new(repo.clone(), 4, Duration::from_millis(120));

        let summary = committer.commit(run.b_groups, CancellationToken::new()).await;

        assert_eq!(summary.groups_incomplete, 1);
        let outcome = summary.outcome_for("M1").unwrap();
        assert_eq!(outcome.committed, 2);
        assert_eq!(outcome.status, GroupStatus::Incomplete);
        assert_eq!(repo.committed_sequence("M1", RecordKind::B), vec![1, 2]);
        // The third insert was cut off mid-flight
        assert_eq!(repo.attempted_sequence("M1", RecordKind::B), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing() {
        let repo = Arc::new(MemoryMatchRepository::new());
        let run = assign_sequences(kind_b("M1", 3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = committer(repo.clone(), 2).commit(run.b_groups, cancel).await;

        assert_eq!(summary.groups_incomplete, 1);
        assert_eq!(repo.row_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let repo = Arc::new(MemoryMatchRepository::new());
        let summary = committer(repo, 2).commit(Vec::new(), CancellationToken::new()).await;
        assert_eq!(summary.groups_total, 0);
        assert!(summary.is_complete());
    }
}
