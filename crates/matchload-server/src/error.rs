//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use matchload_common::MatchloadError;
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::{IngestError, RepositoryError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<MatchloadError> for AppError {
    fn from(err: MatchloadError) -> Self {
        match err {
            MatchloadError::SourceNotFound(name) => AppError::NotFound(format!("File '{}' not found", name)),
            MatchloadError::InvalidSourcePath(reason) => {
                AppError::Validation(format!("Invalid file name: {}", reason))
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Ingest(_) | AppError::Repository(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Ingest(_) => "INGESTION_FAILED",
            AppError::Repository(_) => "DATABASE_ERROR",
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            AppError::Repository(ref e) => {
                tracing::error!("Repository error: {:?}", e);
                "A database error occurred".to_string()
            },
            AppError::Ingest(ref e) => {
                tracing::error!("Ingestion error: {}", e);
                self.to_string()
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                message.clone()
            },
            AppError::NotFound(ref message)
            | AppError::Validation(ref message)
            | AppError::Unavailable(ref message) => message.clone(),
        };

        (status, Json(ErrorResponse::new(self.code(), message))).into_response()
    }
}
