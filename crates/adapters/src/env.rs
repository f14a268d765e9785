// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// SSH connect timeout for probes and sessions (default: 10s).
pub fn ssh_connect_timeout() -> Duration {
    parse_duration_ms("YEAGER_SSH_CONNECT_TIMEOUT_MS").unwrap_or(Duration::from_secs(10))
}

/// `aws` CLI invocation timeout (default: 60s).
pub fn aws_timeout() -> Duration {
    parse_duration_ms("YEAGER_AWS_TIMEOUT_MS").unwrap_or(crate::subprocess::AWS_TIMEOUT)
}
