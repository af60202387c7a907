//! matchload server - Main entry point

use anyhow::Result;
use matchload_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use tracing::info;

use matchload_server::{
    api,
    config::Config,
    db,
    ingest::{IngestionPipeline, PgMatchRepository, RunCounter},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("matchload-server")
        .filter_directives("matchload_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .overlay_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting matchload server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}, data directory {}",
        config.bind_address(),
        config.ingest.data_dir.display()
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let repository = PgMatchRepository::new(pool);

    // Continue numbering after the runs already stored
    let last_run_id = repository.latest_run_id().await?;
    let run_counter = Arc::new(RunCounter::starting_after(last_run_id));
    info!(last_run_id, "Run counter initialized");

    let pipeline = IngestionPipeline::new(Arc::new(repository), run_counter, config.ingest.clone());

    api::serve(&config, pipeline).await
}
