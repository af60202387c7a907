//! matchload ingest - Main entry point

use clap::Parser;
use matchload_common::logging::{init_logging, LogConfig, LogLevel};
use matchload_ingest::{exit_code, run, Cli};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("matchload-ingest")
        .build();
    let log_config = log_config.clone().overlay_env().unwrap_or(log_config);

    // Held until main returns so buffered file output is flushed
    let _log_guard = init_logging(&log_config).ok();

    let result = run(&cli).await;

    match result {
        Ok(ref report) => match serde_json::to_string_pretty(report) {
            Ok(json) => {
                println!("{}", json);
                if report.is_complete() {
                    info!(run_id = %report.run_id, "Ingestion complete");
                } else {
                    warn!(
                        run_id = %report.run_id,
                        failed = report.batched.groups_failed + report.ordered.groups_failed,
                        incomplete = report.batched.groups_incomplete + report.ordered.groups_incomplete,
                        "Ingestion finished with unfinished groups"
                    );
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to render report");
                eprintln!("Error: failed to render report: {}", e);
                return ExitCode::FAILURE;
            },
        },
        Err(ref e) => {
            error!(error = %e, "Ingestion failed");
            eprintln!("Error: {:#}", e);
        },
    }

    exit_code(&result)
}
