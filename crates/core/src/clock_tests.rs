// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn fake_clock_advance_moves_both_timelines() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_utc = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start, Duration::from_secs(90));
    assert_eq!(clock.now_utc() - start_utc, chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_set_utc() {
    let clock = FakeClock::new();
    let at = Utc.timestamp_opt(1_800_000_000, 0).single().unwrap();
    clock.set_utc(at);
    assert_eq!(clock.now_utc(), at);
}
