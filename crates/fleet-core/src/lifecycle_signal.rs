//! Per-task lifecycle signal slots — spec §3 "Lifecycle record" and §4.E
//! "Signal routing".
//!
//! Each task has at most one pending `advance` signal and one pending
//! `close` signal. Both are single-slot, last-writer-wins by timestamp, and
//! are consumed ("taken") by the first lifecycle decision after the
//! verifier exits. When both are present, the newer `ts` wins; a tie goes
//! to `close` (spec §8 property 6).

use crate::ids::AgentLocalId;

/// What the verifier asked the lifecycle engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceAction {
    Worker,
    Scout,
    Defer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceSignal {
    pub action: AdvanceAction,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub agent_id: AgentLocalId,
    pub ts_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSignal {
    pub reason: Option<String>,
    pub agent_id: AgentLocalId,
    pub ts_ms: u64,
}

/// Outcome of taking a task's lifecycle slots: at most one signal wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakenSignal {
    Advance(AdvanceSignal),
    Close(CloseSignal),
    None,
}

/// The single-slot advance/close pair for one task.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSlot {
    advance: Option<AdvanceSignal>,
    close: Option<CloseSignal>,
}

impl LifecycleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post an advance signal; last-writer-wins by `ts_ms`.
    pub fn post_advance(&mut self, signal: AdvanceSignal) {
        match &self.advance {
            Some(existing) if existing.ts_ms > signal.ts_ms => {}
            _ => self.advance = Some(signal),
        }
    }

    /// Post a close signal; last-writer-wins by `ts_ms`.
    ///
    /// Posting a close always clears any pending advance signal immediately:
    /// a close that arrives before the verifier even exits must still
    /// suppress the advance branch once the verifier does exit.
    pub fn post_close(&mut self, signal: CloseSignal) {
        match &self.close {
            Some(existing) if existing.ts_ms > signal.ts_ms => {}
            _ => {
                self.close = Some(signal);
                self.advance = None;
            }
        }
    }

    /// Read-and-clear both slots, returning whichever signal wins.
    /// Close wins on equal timestamps (spec §8 property 6).
    pub fn take(&mut self) -> TakenSignal {
        let advance = self.advance.take();
        let close = self.close.take();
        match (advance, close) {
            (None, None) => TakenSignal::None,
            (Some(a), None) => TakenSignal::Advance(a),
            (None, Some(c)) => TakenSignal::Close(c),
            (Some(a), Some(c)) => {
                if c.ts_ms >= a.ts_ms {
                    TakenSignal::Close(c)
                } else {
                    TakenSignal::Advance(a)
                }
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.advance.is_some() || self.close.is_some()
    }
}

#[cfg(test)]
#[path = "lifecycle_signal_tests.rs"]
mod tests;
