//! Leading-and-trailing debounce for UI-dirty signaling (spec §4.D.6, §5,
//! §9 "UI-dirty debounce"): driven by [`Clock`], not wall-clock
//! `Instant::now()` directly, so it is deterministically testable with
//! `FakeClock`.

use std::time::Duration;

use fleet_core::Clock;
use parking_lot::Mutex;

/// Default debounce window (spec §4.D.6: "~150 ms").
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

#[derive(Default)]
struct State {
    last_fire: Option<std::time::Instant>,
    pending_trailing: bool,
}

/// A call either fires right away (leading edge of a burst) or needs a
/// trailing flush once the burst goes quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    FireNow,
    Coalesced,
}

/// One debouncer instance per mark-dirty signal source (spec: one per
/// agent's RPC handler).
pub struct Debouncer<C: Clock> {
    clock: C,
    window: Duration,
    state: Mutex<State>,
}

impl<C: Clock> Debouncer<C> {
    pub fn new(clock: C) -> Self {
        Self::with_window(clock, DEFAULT_DEBOUNCE_WINDOW)
    }

    pub fn with_window(clock: C, window: Duration) -> Self {
        Self { clock, window, state: Mutex::new(State::default()) }
    }

    /// Mark dirty. Returns `FireNow` on the leading edge of a burst;
    /// subsequent calls within `window` coalesce and flag a pending
    /// trailing flush, which [`Debouncer::take_trailing`] surfaces once the
    /// window has elapsed with no further calls.
    pub fn mark(&self) -> DebounceOutcome {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.last_fire {
            Some(last) if now.duration_since(last) < self.window => {
                state.pending_trailing = true;
                DebounceOutcome::Coalesced
            }
            _ => {
                state.last_fire = Some(now);
                state.pending_trailing = false;
                DebounceOutcome::FireNow
            }
        }
    }

    /// Poll for a trailing flush: `true` exactly once per burst, the first
    /// time this is called after the window has elapsed since the last
    /// `mark()` and at least one call was coalesced.
    pub fn take_trailing(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(last) = state.last_fire else { return false };
        if state.pending_trailing && now.duration_since(last) >= self.window {
            state.pending_trailing = false;
            state.last_fire = Some(now);
            return true;
        }
        false
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
