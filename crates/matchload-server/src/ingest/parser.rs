//! Match-event flat file parser
//!
//! # File Format
//! ```text
//! MATCH_ID|MARKET_ID|OUTCOME_ID|SPECIFIERS
//! 'sr:match:1'|60|'1'|'total=2.5'
//! 'sr:match:1'|1|'2'
//! ```
//!
//! The first line is a header and is always discarded. Fields are separated by
//! `|` and single quotes are stripped from every field. The fourth field is
//! optional; when it is missing or empty the record has no specifiers.
//!
//! # Line policy
//! - fewer than 3 fields, or an empty match id: skipped with a warning
//! - non-numeric market id: the whole run fails, nothing is committed
//! - unreadable input (I/O, invalid UTF-8): the whole run fails

use chrono::Utc;
use std::io::{BufRead, Lines};
use std::num::ParseIntError;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{MatchRecord, RunId};

pub const FIELD_DELIMITER: char = '|';
pub const QUOTE: char = '\'';
pub const MIN_FIELDS: usize = 3;

/// Fatal parse failures; any of these aborts the run
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: invalid market id '{value}'")]
    InvalidMarketId {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Why a line was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooFewFields(usize),
    EmptyMatchId,
}

/// Outcome of parsing a single data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Record(MatchRecord),
    Skipped(SkipReason),
}

/// Counters for one pass over a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Data lines read, header excluded
    pub lines_read: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Parser for `|`-delimited match-event files
#[derive(Debug, Clone, Copy)]
pub struct MatchRecordParser {
    run_id: RunId,
}

impl MatchRecordParser {
    /// All records produced by this parser carry `run_id`
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Parse one data line. `line_num` is 1-based and counts the header.
    pub fn parse_line(&self, line: &str, line_num: usize) -> Result<LineOutcome, ParseError> {
        let mut fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();

        // Trailing empty fields do not count towards the minimum
        while fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }

        if fields.len() < MIN_FIELDS {
            return Ok(LineOutcome::Skipped(SkipReason::TooFewFields(fields.len())));
        }

        let match_id = strip_quotes(fields[0]);
        if match_id.is_empty() {
            return Ok(LineOutcome::Skipped(SkipReason::EmptyMatchId));
        }

        let raw_market_id = strip_quotes(fields[1]);
        let market_id = raw_market_id
            .parse::<i32>()
            .map_err(|source| ParseError::InvalidMarketId {
                line: line_num,
                value: raw_market_id.clone(),
                source,
            })?;

        let outcome_id = strip_quotes(fields[2]);
        let specifiers = fields.get(3).map(|f| strip_quotes(f));

        Ok(LineOutcome::Record(MatchRecord::new(
            match_id,
            market_id,
            outcome_id,
            specifiers,
            Utc::now(),
            self.run_id,
        )))
    }

    /// Lazily parse `reader`, skipping the header line.
    ///
    /// The iterator yields records and stops after the first fatal error.
    pub fn records<R: BufRead>(&self, reader: R) -> Records<R> {
        Records {
            parser: *self,
            lines: reader.lines(),
            line_num: 0,
            stats: ParseStats::default(),
            done: false,
        }
    }

    /// Parse the whole source into memory
    pub fn parse_all<R: BufRead>(
        &self,
        reader: R,
    ) -> Result<(Vec<MatchRecord>, ParseStats), ParseError> {
        let mut records = self.records(reader);
        let parsed = records.by_ref().collect::<Result<Vec<_>, _>>()?;
        let stats = records.stats();

        debug!(
            run_id = %self.run_id,
            lines = stats.lines_read,
            records = stats.records,
            skipped = stats.skipped,
            "Parsed source"
        );

        Ok((parsed, stats))
    }
}

fn strip_quotes(field: &str) -> String {
    field.replace(QUOTE, "")
}

/// Iterator returned by [`MatchRecordParser::records`]
pub struct Records<R> {
    parser: MatchRecordParser,
    lines: Lines<R>,
    line_num: usize,
    stats: ParseStats,
    done: bool,
}

impl<R> Records<R> {
    pub fn stats(&self) -> ParseStats {
        self.stats
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<MatchRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(source)) => {
                    self.done = true;
                    return Some(Err(ParseError::Io {
                        line: self.line_num + 1,
                        source,
                    }));
                },
                None => {
                    self.done = true;
                    return None;
                },
            };
            self.line_num += 1;

            if self.line_num == 1 {
                continue;
            }
            self.stats.lines_read += 1;

            match self.parser.parse_line(&line, self.line_num) {
                Ok(LineOutcome::Record(record)) => {
                    self.stats.records += 1;
                    return Some(Ok(record));
                },
                Ok(LineOutcome::Skipped(reason)) => {
                    self.stats.skipped += 1;
                    warn!(line = self.line_num, ?reason, content = %line, "Skipping malformed line");
                },
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                },
            }
        }
    }
}
