//! Core types for match-event ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(u64);

impl RunId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit strategy a record is routed to.
///
/// Records carrying specifiers are kind `A` and are committed in unordered
/// batches; records without specifiers are kind `B` and are committed one at
/// a time in strict per-match sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    A,
    B,
}

impl RecordKind {
    pub fn classify(specifiers: Option<&str>) -> Self {
        match specifiers {
            Some(s) if !s.is_empty() => RecordKind::A,
            _ => RecordKind::B,
        }
    }

    /// Value stored in the `event_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::B => "B",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested match event (maps to the match_data table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub market_id: i32,
    pub outcome_id: String,
    /// Never `Some("")`: empty specifiers are normalized to `None`
    pub specifiers: Option<String>,
    /// Wall-clock time at parse, not taken from the file
    pub inserted_at: DateTime<Utc>,
    pub run_id: String,
    /// 1-based position inside the (match_id, kind) group, 0 until sequenced
    pub sequence_number: u32,
    pub kind: RecordKind,
}

impl MatchRecord {
    pub fn new(
        match_id: impl Into<String>,
        market_id: i32,
        outcome_id: impl Into<String>,
        specifiers: Option<String>,
        inserted_at: DateTime<Utc>,
        run_id: RunId,
    ) -> Self {
        let specifiers = specifiers.filter(|s| !s.is_empty());
        let kind = RecordKind::classify(specifiers.as_deref());

        Self {
            match_id: match_id.into(),
            market_id,
            outcome_id: outcome_id.into(),
            specifiers,
            inserted_at,
            run_id: run_id.to_string(),
            sequence_number: 0,
            kind,
        }
    }

    pub fn is_sequenced(&self) -> bool {
        self.sequence_number > 0
    }
}

/// Records sharing (match_id, kind), held in ascending sequence order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub match_id: String,
    pub kind: RecordKind,
    pub records: Vec<MatchRecord>,
}

impl MatchGroup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Earliest and latest insertion time recorded for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTimestamps {
    pub min_inserted_at: Option<DateTime<Utc>>,
    pub max_inserted_at: Option<DateTime<Utc>>,
}

impl RunTimestamps {
    pub fn is_empty(&self) -> bool {
        self.min_inserted_at.is_none() && self.max_inserted_at.is_none()
    }

    /// Seconds between first and last insert, with sub-second precision
    pub fn duration_seconds(&self) -> Option<f64> {
        let (min, max) = (self.min_inserted_at?, self.max_inserted_at?);
        let micros = (max - min).num_microseconds()?;
        Some(micros as f64 / 1_000_000.0)
    }
}
