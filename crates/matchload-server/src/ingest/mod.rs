//! Match-event ingestion
//!
//! # Architecture
//!
//! - **run_id**: injectable monotonic run id counter
//! - **parser**: `|`-delimited flat file to [`MatchRecord`]s
//! - **sequencer**: grouping by (match, kind) and 1-based sequence numbers
//! - **batched**: kind-A commits, batched and unordered
//! - **gate**: per-match turn gates for ordered commits
//! - **ordered**: kind-B commits, one record per insert in strict order
//! - **repository**: storage gateway (PostgreSQL and in-memory)
//! - **pipeline**: ties the stages together and builds the [`IngestReport`]
//!
//! Records with specifiers are kind A; records without are kind B.

pub mod batched;
pub mod config;
pub mod gate;
pub mod models;
pub mod ordered;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod repository;
pub mod run_id;
pub mod sequencer;

pub use batched::BatchedCommitter;
pub use config::IngestConfig;
pub use gate::{GateError, GateRegistry, SequenceGate};
pub use models::{MatchGroup, MatchRecord, RecordKind, RunId, RunTimestamps};
pub use ordered::OrderedCommitter;
pub use parser::{MatchRecordParser, ParseError, ParseStats};
pub use pipeline::{IngestError, IngestionPipeline};
pub use report::{CommitSummary, GroupOutcome, GroupStatus, IngestReport};
pub use repository::{MatchRepository, MemoryMatchRepository, PgMatchRepository, RepositoryError};
pub use run_id::RunCounter;
pub use sequencer::{assign_sequences, SequencedRun};
