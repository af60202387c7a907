//! Feature modules implementing the matchload API
//!
//! Each feature is a vertical slice following the CQRS pattern:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator `Request` marker so the
//! request/response pair of every operation is declared in one place.

pub mod file_processing;

use axum::Router;

use crate::ingest::IngestionPipeline;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub pipeline: IngestionPipeline,
}

/// Creates the API router with all feature routes mounted
///
/// - `/file-processing` - File ingestion and run timestamps
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest(
        "/file-processing",
        file_processing::file_processing_routes().with_state(state.pipeline),
    )
}
