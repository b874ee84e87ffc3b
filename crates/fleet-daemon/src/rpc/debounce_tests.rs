use std::time::Duration;

use fleet_core::FakeClock;

use super::*;

#[test]
fn leading_call_fires_immediately() {
    let debouncer = Debouncer::new(FakeClock::new());
    assert_eq!(debouncer.mark(), DebounceOutcome::FireNow);
}

#[test]
fn burst_coalesces_until_window_elapses() {
    let clock = FakeClock::new();
    let debouncer = Debouncer::with_window(clock.clone(), Duration::from_millis(150));

    assert_eq!(debouncer.mark(), DebounceOutcome::FireNow);
    clock.advance(Duration::from_millis(10));
    assert_eq!(debouncer.mark(), DebounceOutcome::Coalesced);
    clock.advance(Duration::from_millis(10));
    assert_eq!(debouncer.mark(), DebounceOutcome::Coalesced);

    // No trailing flush yet: window hasn't elapsed since the last fire.
    assert!(!debouncer.take_trailing());

    clock.advance(Duration::from_millis(150));
    assert!(debouncer.take_trailing());
    // Only fires once per burst.
    assert!(!debouncer.take_trailing());
}

#[test]
fn quiet_period_resets_to_leading_fire() {
    let clock = FakeClock::new();
    let debouncer = Debouncer::with_window(clock.clone(), Duration::from_millis(150));

    assert_eq!(debouncer.mark(), DebounceOutcome::FireNow);
    clock.advance(Duration::from_millis(200));
    assert_eq!(debouncer.mark(), DebounceOutcome::FireNow);
}
