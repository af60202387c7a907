//! Ingestion pipeline
//!
//! One run: allocate a run id, parse the whole source, assign per-match
//! sequence numbers, then commit kind-A and kind-B groups as two independent
//! tasks and join them into an [`IngestReport`].
//!
//! Anything that goes wrong before committing starts (opening or reading the
//! source, a bad market id) fails the run with nothing written. Once
//! committing has started, failures are reported per group and never abort
//! the run.

use chrono::Utc;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::batched::BatchedCommitter;
use super::config::IngestConfig;
use super::models::{MatchGroup, RunTimestamps};
use super::ordered::OrderedCommitter;
use super::parser::{MatchRecordParser, ParseError};
use super::report::{CommitSummary, GroupOutcome, IngestReport};
use super::repository::{MatchRepository, RepositoryError};
use super::run_id::RunCounter;
use super::sequencer::assign_sequences;

/// Fatal run failures; nothing was committed when one of these is returned
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open source {}: {source}", .path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Parser task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct IngestionPipeline {
    repository: Arc<dyn MatchRepository>,
    run_counter: Arc<RunCounter>,
    config: IngestConfig,
    shutdown: CancellationToken,
}

impl IngestionPipeline {
    pub fn new(
        repository: Arc<dyn MatchRepository>,
        run_counter: Arc<RunCounter>,
        config: IngestConfig,
    ) -> Self {
        Self {
            repository,
            run_counter,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn run_counter(&self) -> &Arc<RunCounter> {
        &self.run_counter
    }

    /// Cancel every run in progress; their unfinished groups end incomplete
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Ingest the file at `path`
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let file = tokio::fs::File::open(path).await.map_err(|source| {
            error!(path = %path.display(), error = %source, "Cannot open source");
            IngestError::SourceOpen {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let file = file.into_std().await;

        self.ingest_reader(BufReader::new(file), &path.display().to_string())
            .await
    }

    /// Ingest an already opened source; `source` only labels the report
    pub async fn ingest_reader<R>(&self, reader: R, source: &str) -> Result<IngestReport, IngestError>
    where
        R: BufRead + Send + 'static,
    {
        let run_id = self.run_counter.next_run_id();
        let started_at = Utc::now();
        info!(run_id = %run_id, source, "Starting ingestion run");

        let parser = MatchRecordParser::new(run_id);
        let parsed = tokio::task::spawn_blocking(move || parser.parse_all(reader)).await?;
        let (records, stats) = parsed.map_err(|e| {
            error!(run_id = %run_id, error = %e, "Parse failed, nothing committed");
            e
        })?;

        let sequenced = assign_sequences(records);
        info!(
            run_id = %run_id,
            records = stats.records,
            skipped = stats.skipped,
            a_groups = sequenced.a_groups.len(),
            b_groups = sequenced.b_groups.len(),
            "Parsed and sequenced source"
        );

        let cancel = self.shutdown.child_token();
        let batched_fallback = all_incomplete(&sequenced.a_groups);
        let ordered_fallback = all_incomplete(&sequenced.b_groups);

        let batched_task = {
            let committer = BatchedCommitter::new(
                Arc::clone(&self.repository),
                self.config.batch_size,
                self.config.batched_concurrency,
            );
            let groups = sequenced.a_groups;
            let cancel = cancel.clone();
            tokio::spawn(async move { committer.commit(groups, cancel).await })
        };

        let ordered_task = {
            let committer = OrderedCommitter::new(
                Arc::clone(&self.repository),
                self.config.ordered_concurrency,
                self.config.ordered_timeout(),
            );
            let groups = sequenced.b_groups;
            let cancel = cancel.clone();
            tokio::spawn(async move { committer.commit(groups, cancel).await })
        };

        let (batched, ordered) = tokio::join!(batched_task, ordered_task);

        let batched = batched.unwrap_or_else(|e| {
            error!(run_id = %run_id, error = %e, "Kind-A commit task died");
            batched_fallback
        });
        let ordered = ordered.unwrap_or_else(|e| {
            error!(run_id = %run_id, error = %e, "Kind-B commit task died");
            ordered_fallback
        });

        let report = IngestReport {
            run_id: run_id.to_string(),
            source: source.to_string(),
            started_at,
            finished_at: Utc::now(),
            lines_read: stats.lines_read,
            lines_skipped: stats.skipped,
            records_parsed: stats.records,
            batched,
            ordered,
        };

        info!(
            run_id = %report.run_id,
            committed = report.records_committed(),
            complete = report.is_complete(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Ingestion run finished"
        );

        Ok(report)
    }

    /// Earliest and latest insertion time for `run_id`
    pub async fn get_timestamps(&self, run_id: &str) -> Result<RunTimestamps, RepositoryError> {
        self.repository.query_timestamps(run_id).await
    }

    pub async fn ping(&self) -> Result<(), RepositoryError> {
        self.repository.ping().await
    }
}

/// Summary used when a commit task panics: nothing in it can be trusted
fn all_incomplete(groups: &[MatchGroup]) -> CommitSummary {
    CommitSummary::from_outcomes(
        groups
            .iter()
            .map(|g| GroupOutcome::incomplete(g.match_id.clone(), g.kind, g.len())),
    )
}
