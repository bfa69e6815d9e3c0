// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now_utc();
    std::thread::sleep(std::time::Duration::from_millis(1));
    let t2 = clock.now_utc();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now_utc();
    clock.advance(Duration::seconds(60));
    let t2 = clock.now_utc();
    assert_eq!(t2 - t1, Duration::seconds(60));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let t1 = clock1.now_utc();
    clock2.advance(Duration::seconds(30));
    assert_eq!(clock1.now_utc() - t1, Duration::seconds(30));
}

#[test]
fn fake_clock_set_pins_time() {
    let clock = FakeClock::new();
    let pinned = Utc::now() + Duration::hours(1);
    clock.set(pinned);
    assert_eq!(clock.now_utc(), pinned);
}
