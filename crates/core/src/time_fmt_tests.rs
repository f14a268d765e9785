// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

#[parameterized(
    millis = { 850, "850ms" },
    seconds = { 3_000, "3s" },
    minutes = { 125_000, "2m05s" },
    hours = { 4_320_000, "1h12m" },
)]
fn elapsed_rendering(ms: u64, expected: &str) {
    assert_eq!(format_elapsed(Duration::from_millis(ms)), expected);
}

#[parameterized(
    seconds = { 5, "5s ago" },
    minutes = { 120, "2m ago" },
    hours = { 3600, "1h ago" },
    days = { 3 * 86400, "3d ago" },
)]
fn relative_rendering(secs_back: i64, expected: &str) {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
    let then = now - chrono::Duration::seconds(secs_back);
    assert_eq!(format_time_ago(then, now), expected);
}

#[test]
fn future_timestamps_clamp_to_zero() {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
    let then = now + chrono::Duration::seconds(30);
    assert_eq!(format_time_ago(then, now), "0s ago");
}
