// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn fake_clock_holds_still_until_advanced() {
    let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let clock = FakeClock::new(start);
    assert_eq!(clock.now(), start);
    assert_eq!(clock.now(), start);
}

#[test]
fn advance_moves_the_clock() {
    let start = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
    let clock = FakeClock::new(start);
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
}

#[test]
fn clones_share_the_same_time() {
    let clock = FakeClock::default();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), other.now());
}
