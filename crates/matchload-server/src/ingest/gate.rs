//! Per-match turn gate for ordered commits
//!
//! A [`SequenceGate`] holds the next sequence number allowed to commit for one
//! match. A task holding sequence `s` waits until the gate reaches `s`,
//! inserts, then advances the gate to `s + 1`, waking every waiter.
//!
//! The gate can also be closed. Closing is terminal: every current and future
//! waiter returns [`GateError::Closed`] instead of blocking. A gate is always
//! either advanced past its last sequence or closed before it is dropped from
//! the [`GateRegistry`]; [`GateLease`] enforces that on every exit path,
//! including a dropped future.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("gate closed before sequence {sequence} got its turn")]
    Closed { sequence: u32 },

    #[error("cancelled while sequence {sequence} waited for its turn")]
    Cancelled { sequence: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateState {
    expected: u32,
    closed: bool,
}

/// Turn gate for a single match id
#[derive(Debug)]
pub struct SequenceGate {
    state: watch::Sender<GateState>,
}

impl SequenceGate {
    /// New gate expecting sequence 1
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState {
            expected: 1,
            closed: false,
        });
        Self { state }
    }

    pub fn expected(&self) -> u32 {
        self.state.borrow().expected
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Wait until `sequence` is the expected number.
    ///
    /// Returns immediately if it already is. Fails when the gate is closed or
    /// `cancel` fires first.
    pub async fn wait_for_turn(
        &self,
        sequence: u32,
        cancel: &CancellationToken,
    ) -> Result<(), GateError> {
        let mut rx = self.state.subscribe();
        let turn = async {
            rx.wait_for(|s| s.closed || s.expected == sequence)
                .await
                .map(|s| s.closed)
                .unwrap_or(true)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GateError::Cancelled { sequence }),
            closed = turn => {
                if closed {
                    Err(GateError::Closed { sequence })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Mark `sequence` as committed and hand the turn to `sequence + 1`.
    ///
    /// Returns false, leaving the gate untouched, if the gate is closed or
    /// `sequence` does not hold the turn.
    pub fn advance(&self, sequence: u32) -> bool {
        self.state.send_if_modified(|s| {
            if s.closed || s.expected != sequence {
                return false;
            }
            s.expected = sequence + 1;
            true
        })
    }

    /// Close the gate and release every waiter
    pub fn close(&self) {
        self.state.send_if_modified(|s| {
            if s.closed {
                return false;
            }
            s.closed = true;
            true
        });
    }
}

impl Default for SequenceGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily created gates keyed by match id
#[derive(Debug, Default)]
pub struct GateRegistry {
    gates: Mutex<HashMap<String, Arc<SequenceGate>>>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate for `match_id`, created on first use.
    ///
    /// Concurrent callers for the same id always receive the same gate.
    pub fn gate_for(&self, match_id: &str) -> Arc<SequenceGate> {
        let mut gates = self.gates.lock();
        if let Some(gate) = gates.get(match_id) {
            return Arc::clone(gate);
        }
        let gate = Arc::new(SequenceGate::new());
        gates.insert(match_id.to_string(), Arc::clone(&gate));
        gate
    }

    /// Gate for `match_id` plus a guard that closes and discards it on drop
    pub fn lease(self: &Arc<Self>, match_id: &str) -> GateLease {
        GateLease {
            gate: self.gate_for(match_id),
            registry: Arc::clone(self),
            match_id: match_id.to_string(),
        }
    }

    /// Close and forget the gate for `match_id`
    pub fn release(&self, match_id: &str) {
        if let Some(gate) = self.gates.lock().remove(match_id) {
            gate.close();
        }
    }

    /// Close and forget every gate, returning how many were live
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = self.gates.lock().drain().collect();
        for (_, gate) in &drained {
            gate.close();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.gates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped access to one match's gate
pub struct GateLease {
    gate: Arc<SequenceGate>,
    registry: Arc<GateRegistry>,
    match_id: String,
}

impl GateLease {
    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }
}

impl Drop for GateLease {
    fn drop(&mut self) {
        self.registry.release(&self.match_id);
    }
}
