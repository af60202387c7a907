//! Run identifier allocation
//!
//! Each ingestion invocation takes one id from a [`RunCounter`]. The counter
//! is an owned value handed to the pipeline, so tests can build their own or
//! reset a shared one without touching process-wide state.

use std::sync::atomic::{AtomicU64, Ordering};

use super::models::RunId;

/// Monotonic run id source, starting at 0 so the first id issued is 1
#[derive(Debug, Default)]
pub struct RunCounter {
    last: AtomicU64,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously issued id, e.g. the highest run id on disk
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    pub fn next_run_id(&self) -> RunId {
        RunId::new(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Last id handed out, 0 if none
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    /// Restore the counter to 0.
    ///
    /// Only for test isolation: calls racing with `next_run_id` may observe
    /// either the old or the reset sequence.
    pub fn reset(&self) {
        self.last.store(0, Ordering::SeqCst);
    }
}
