// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[test]
fn fake_clock_only_moves_when_advanced() {
    let clock = FakeClock::new();
    let start = clock.now();

    assert_eq!(clock.now(), start);

    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now() - start, Duration::from_secs(5));
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();

    clock.advance(Duration::from_millis(1500));
    assert_eq!(other.now() - clock.now(), Duration::ZERO);
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}

#[test]
fn system_clock_epoch_is_sane() {
    // 2020-01-01 in epoch milliseconds.
    assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
}
