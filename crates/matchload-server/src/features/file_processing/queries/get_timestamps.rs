use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::ingest::IngestionPipeline;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTimestampsQuery {
    #[serde(rename = "runId", default)]
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTimestampsResponse {
    pub run_id: String,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Only present when both bounds are known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Request<Result<GetTimestampsResponse, AppError>> for GetTimestampsQuery {}

impl GetTimestampsQuery {
    pub fn validate(&self) -> Result<&str, AppError> {
        match self.run_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(AppError::Validation("runId is required".to_string())),
        }
    }
}

#[tracing::instrument(skip(pipeline))]
pub async fn handle(
    pipeline: IngestionPipeline,
    query: GetTimestampsQuery,
) -> Result<GetTimestampsResponse, AppError> {
    let run_id = query.validate()?;
    let stamps = pipeline.get_timestamps(run_id).await?;

    Ok(GetTimestampsResponse {
        run_id: run_id.to_string(),
        min_date: stamps.min_inserted_at,
        max_date: stamps.max_inserted_at,
        duration_seconds: stamps.duration_seconds(),
    })
}
