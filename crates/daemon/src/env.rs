// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::time::Duration;

/// Idle check interval (default: 5s). `YEAGER_CHECK_INTERVAL` accepts
/// duration strings ("100ms", "2s") so tests can tick fast.
pub fn check_interval() -> Duration {
    std::env::var("YEAGER_CHECK_INTERVAL")
        .ok()
        .and_then(|s| yg_core::parse_duration(&s).ok())
        .unwrap_or(Duration::from_secs(5))
}

/// `YEAGER_TEST_MODE` switches the daemon onto the file-backed fake cloud
/// adapter for end-to-end lifecycle tests.
pub fn test_mode() -> bool {
    std::env::var("YEAGER_TEST_MODE").map(|v| !v.is_empty()).unwrap_or(false)
}
