//! Per-group commit outcomes and the run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::RecordKind;

/// How a match group's commit ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Committed,
    /// An insert failed; `at_sequence` is the first record of the failed insert
    Failed { at_sequence: u32, error: String },
    /// Stopped by cancellation or timeout before every record was attempted
    Incomplete,
}

/// Result of committing one match group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub match_id: String,
    pub kind: RecordKind,
    pub total: usize,
    pub committed: usize,
    /// Insert calls that succeeded
    pub inserts: usize,
    #[serde(flatten)]
    pub status: GroupStatus,
}

impl GroupOutcome {
    pub fn incomplete(match_id: impl Into<String>, kind: RecordKind, total: usize) -> Self {
        Self {
            match_id: match_id.into(),
            kind,
            total,
            committed: 0,
            inserts: 0,
            status: GroupStatus::Incomplete,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status == GroupStatus::Committed
    }
}

/// Aggregated outcome of one committer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub groups_total: usize,
    pub groups_committed: usize,
    pub groups_failed: usize,
    pub groups_incomplete: usize,
    pub records_total: usize,
    pub records_committed: usize,
    pub inserts: usize,
    /// Failed and incomplete groups; committed groups are only counted
    pub unfinished: Vec<GroupOutcome>,
}

impl CommitSummary {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = GroupOutcome>) -> Self {
        let mut summary = Self::default();

        for outcome in outcomes {
            summary.groups_total += 1;
            summary.records_total += outcome.total;
            summary.records_committed += outcome.committed;
            summary.inserts += outcome.inserts;

            match outcome.status {
                GroupStatus::Committed => summary.groups_committed += 1,
                GroupStatus::Failed { .. } => {
                    summary.groups_failed += 1;
                    summary.unfinished.push(outcome);
                },
                GroupStatus::Incomplete => {
                    summary.groups_incomplete += 1;
                    summary.unfinished.push(outcome);
                },
            }
        }

        summary.unfinished.sort_by(|a, b| a.match_id.cmp(&b.match_id));
        summary
    }

    pub fn is_complete(&self) -> bool {
        self.groups_failed == 0 && self.groups_incomplete == 0
    }

    pub fn outcome_for(&self, match_id: &str) -> Option<&GroupOutcome> {
        self.unfinished.iter().find(|o| o.match_id == match_id)
    }
}

/// Everything observable about one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub records_parsed: usize,
    /// Kind A: batched, unordered
    pub batched: CommitSummary,
    /// Kind B: one record per insert, strict per-match order
    pub ordered: CommitSummary,
}

impl IngestReport {
    /// Every group of both kinds committed in full
    pub fn is_complete(&self) -> bool {
        self.batched.is_complete() && self.ordered.is_complete()
    }

    pub fn records_committed(&self) -> usize {
        self.batched.records_committed + self.ordered.records_committed
    }
}
