//! matchload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//!
//! Shared error and logging plumbing for the matchload workspace.
//!
//! - **Error Handling**: the workspace-wide [`MatchloadError`] and [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], used by
//!   both the HTTP service and the one-shot ingest CLI
//!
//! # Example
//!
//! ```no_run
//! use matchload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{MatchloadError, Result};
