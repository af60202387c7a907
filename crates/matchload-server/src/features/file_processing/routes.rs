//! File processing API routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/file-processing/process?fileName=<name>` - Ingest a file from the data directory
//! - `GET /api/v1/file-processing/timestamps?runId=<id>` - First and last insert time of a run

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::ingest::IngestionPipeline;

use super::{commands::ProcessFileCommand, queries::GetTimestampsQuery};

pub fn file_processing_routes() -> Router<IngestionPipeline> {
    Router::new()
        .route("/process", post(process_file))
        .route("/timestamps", get(get_timestamps))
}

/// Ingest one file
///
/// # Response
///
/// - `200 OK` - Run finished; the report lists failed or incomplete groups
/// - `400 Bad Request` - Missing file name, or a name outside the data directory
/// - `404 Not Found` - No such file
/// - `500 Internal Server Error` - The run failed before committing anything
#[tracing::instrument(skip(pipeline))]
async fn process_file(
    State(pipeline): State<IngestionPipeline>,
    Query(command): Query<ProcessFileCommand>,
) -> Result<Response, AppError> {
    let report = super::commands::process_file::handle(pipeline, command).await?;
    Ok(ApiResponse::success(report).into_response())
}

/// Timestamps of a run
///
/// # Response
///
/// - `200 OK` - Bounds of the run; both null when the run is unknown
/// - `400 Bad Request` - Missing run id
#[tracing::instrument(skip(pipeline))]
async fn get_timestamps(
    State(pipeline): State<IngestionPipeline>,
    Query(query): Query<GetTimestampsQuery>,
) -> Result<Response, AppError> {
    let response = super::queries::get_timestamps::handle(pipeline, query).await?;

    tracing::debug!(
        run_id = %response.run_id,
        duration_seconds = ?response.duration_seconds,
        "Timestamps retrieved via API"
    );

    Ok(ApiResponse::success(response).into_response())
}
