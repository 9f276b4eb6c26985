// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn system_clock_epoch_is_recent() {
    // 2020-01-01T00:00:00Z
    assert!(SystemClock.epoch_ms() > 1_577_836_800_000);
}

#[test]
fn fake_clock_advance_moves_both_clocks() {
    let clock = FakeClock::at_epoch_ms(0);
    let t1 = clock.now();
    clock.advance(Duration::from_secs(90));
    assert!(clock.now().duration_since(t1) >= Duration::from_secs(90));
    assert_eq!(clock.epoch_ms(), 90_000);
    assert_eq!(clock.epoch_minute(), 1);
}

#[test]
fn fake_clock_clones_share_time() {
    let a = FakeClock::at_epoch_ms(0);
    let b = a.clone();
    b.advance_minutes(3);
    assert_eq!(a.epoch_minute(), 3);
}

#[test]
fn set_epoch_ms_jumps_wall_time_only() {
    let clock = FakeClock::at_epoch_ms(0);
    let before = clock.now();
    clock.set_epoch_ms(10_000 * MINUTE_MS);
    assert_eq!(clock.now(), before);
    assert_eq!(clock.epoch_minute(), 10_000);
}
