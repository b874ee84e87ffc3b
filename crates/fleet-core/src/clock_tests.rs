use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_millis(500));

    assert_eq!(clock.now(), start + Duration::from_millis(500));
    assert_eq!(clock.epoch_ms(), start_ms + 500);
}

#[test]
fn fake_clock_set_epoch_ms_is_absolute() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn system_clock_epoch_ms_is_recent() {
    let clock = SystemClock;
    let ms = clock.epoch_ms();
    // Anything after 2020-01-01 in epoch ms.
    assert!(ms > 1_577_836_800_000);
}
