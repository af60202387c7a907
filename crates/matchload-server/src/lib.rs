//! matchload server library
//!
//! Loads `|`-delimited match-event files into PostgreSQL and reports on each
//! run.
//!
//! # Overview
//!
//! - **Ingestion**: parse, sequence per match, then commit records with
//!   specifiers in batches and records without specifiers one at a time in
//!   strict per-match order
//! - **API Endpoints**: trigger a run for a file and query a run's timestamps
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS, request tracing and compression
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use matchload_server::{api, config::Config, db, ingest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let repository = Arc::new(ingest::PgMatchRepository::new(pool));
//!     let counter = Arc::new(ingest::RunCounter::new());
//!     let pipeline = ingest::IngestionPipeline::new(repository, counter, config.ingest.clone());
//!     api::serve(&config, pipeline).await
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
