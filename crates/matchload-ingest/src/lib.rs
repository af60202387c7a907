//! matchload ingest - one-shot command line ingestion
//!
//! Runs the same pipeline as the HTTP service over a single file and prints
//! the run report as JSON. `--dry-run` swaps PostgreSQL for the in-memory
//! repository, which validates a file without a database.
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use matchload_server::config::DatabaseConfig;
use matchload_server::db;
use matchload_server::ingest::{
    IngestConfig, IngestReport, IngestionPipeline, MatchRepository, MemoryMatchRepository,
    PgMatchRepository, RunCounter,
};

#[derive(Parser, Debug)]
#[command(name = "matchload-ingest")]
#[command(author, version, about = "Load a match-event file into PostgreSQL")]
pub struct Cli {
    /// `|`-delimited input file with a header line
    pub file: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Records per kind-A insert
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Kind-A groups committed at once
    #[arg(long)]
    pub batched_concurrency: Option<usize>,

    /// Kind-B matches committed at once
    #[arg(long)]
    pub ordered_concurrency: Option<usize>,

    /// Upper bound in seconds on the kind-B phase
    #[arg(long)]
    pub ordered_timeout_secs: Option<u64>,

    /// Parse and commit into memory only
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Environment configuration with command line overrides applied
    pub fn ingest_config(&self) -> Result<IngestConfig> {
        let mut config = IngestConfig::from_env()?;

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(concurrency) = self.batched_concurrency {
            config.batched_concurrency = concurrency;
        }
        if let Some(concurrency) = self.ordered_concurrency {
            config.ordered_concurrency = concurrency;
        }
        if let Some(timeout) = self.ordered_timeout_secs {
            config.ordered_timeout_secs = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::from_env();
        if let Some(ref url) = self.database_url {
            config.url = url.clone();
        }
        config
    }
}

/// Build the repository the run writes to
async fn repository(cli: &Cli) -> Result<(Arc<dyn MatchRepository>, Arc<RunCounter>)> {
    if cli.dry_run {
        info!("Dry run: records are kept in memory");
        return Ok((Arc::new(MemoryMatchRepository::new()), Arc::new(RunCounter::new())));
    }

    let pool = db::create_pool(&cli.database_config())
        .await
        .context("Failed to connect to the database")?;
    db::run_migrations(&pool).await?;

    let repository = PgMatchRepository::new(pool);
    let last_run_id = repository.latest_run_id().await?;

    Ok((Arc::new(repository), Arc::new(RunCounter::starting_after(last_run_id))))
}

/// Ingest `cli.file` and return the report
pub async fn run(cli: &Cli) -> Result<IngestReport> {
    let config = cli.ingest_config()?;
    let (repository, run_counter) = repository(cli).await?;
    let pipeline = IngestionPipeline::new(repository, run_counter, config);

    let report = pipeline
        .ingest_path(&cli.file)
        .await
        .with_context(|| format!("Failed to ingest {}", cli.file.display()))?;

    Ok(report)
}

/// Process status for a finished run: 0 complete, 1 error, 2 unfinished groups
pub fn exit_status(result: &Result<IngestReport>) -> u8 {
    match result {
        Ok(report) if report.is_complete() => 0,
        Ok(_) => 2,
        Err(_) => 1,
    }
}

/// Returned from `main` so the process exits after the log guard is dropped
pub fn exit_code(result: &Result<IngestReport>) -> ExitCode {
    ExitCode::from(exit_status(result))
}
