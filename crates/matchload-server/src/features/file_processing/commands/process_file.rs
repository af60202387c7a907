use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::ingest::{IngestReport, IngestionPipeline};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessFileCommand {
    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,
}

impl Request<Result<IngestReport, AppError>> for ProcessFileCommand {}

impl ProcessFileCommand {
    pub fn validate(&self) -> Result<&str, AppError> {
        match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(AppError::Validation("fileName is required".to_string())),
        }
    }
}

/// Resolve the file inside the data directory and run it through the pipeline
#[tracing::instrument(skip(pipeline))]
pub async fn handle(
    pipeline: IngestionPipeline,
    command: ProcessFileCommand,
) -> Result<IngestReport, AppError> {
    let file_name = command.validate()?;
    let path = pipeline.config().resolve_source(file_name).await?;

    let report = pipeline.ingest_path(&path).await?;

    tracing::info!(
        run_id = %report.run_id,
        records = report.records_parsed,
        complete = report.is_complete(),
        "File processed"
    );

    Ok(report)
}
