//! Error types shared across matchload crates

use thiserror::Error;

/// Result type alias for matchload operations
pub type Result<T> = std::result::Result<T, MatchloadError>;

/// Errors raised while locating a source file.
///
/// The pipeline and HTTP layers define their own enums and wrap this one.
#[derive(Error, Debug)]
pub enum MatchloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Invalid source path: {0}")]
    InvalidSourcePath(String),
}
