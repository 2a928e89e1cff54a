// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(b >= a);
    assert!(a > 1_600_000_000_000, "epoch should be after 2020");
}

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new(1_000_000);
    assert_eq!(clock.epoch_ms(), 1_000_000);
    assert_eq!(clock.epoch_secs(), 1_000);

    clock.advance_ms(5_500);
    assert_eq!(clock.epoch_ms(), 1_005_500);
    assert_eq!(clock.epoch_secs(), 1_005);
}

#[test]
fn fake_clock_set() {
    let clock = FakeClock::default();
    clock.set_epoch_ms(42_000);
    assert_eq!(clock.epoch_secs(), 42);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new(0);
    let other = clock.clone();
    clock.advance_ms(100);
    assert_eq!(other.epoch_ms(), 100);
}
