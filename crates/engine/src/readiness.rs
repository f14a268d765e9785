// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH readiness probing.
//!
//! An instance reports "running" well before sshd accepts connections.
//! The prober attempts pure connect+close probes with exponential backoff;
//! no command runs until the first real session. Ephemeral keys are only
//! valid for ~60s at the cloud edge, so the key is re-pushed after every
//! third failed attempt to keep the window open for the session that
//! follows a successful probe.

use crate::orchestrator::OrchestratorError;
use crate::report::Reporter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use yg_adapters::{CloudAdapter, Transport, VmInfo};

/// Probe schedule. Defaults: 12 attempts, 2s backoff doubling to an 8s cap.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub probe_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(8),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Probe until sshd accepts connections or the schedule is exhausted.
pub async fn wait_ssh_ready<C: CloudAdapter, T: Transport>(
    cloud: &C,
    transport: &T,
    vm: &VmInfo,
    os_user: &str,
    public_key: Option<&str>,
    config: ReadinessConfig,
    reporter: &dyn Reporter,
    cancel: &CancellationToken,
) -> Result<(), OrchestratorError> {
    let mut delay = config.initial_delay;
    let mut failures_since_push = 0u32;

    push_key(cloud, vm, os_user, public_key).await;

    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        match transport.probe(config.probe_timeout).await {
            Ok(()) => {
                debug!(attempt, "ssh ready");
                return Ok(());
            }
            Err(e) => {
                debug!(attempt, error = %e, "ssh not ready yet");
                failures_since_push += 1;
            }
        }

        if attempt % 3 == 0 {
            reporter.info(&format!(
                "waiting for SSH to come up (attempt {}/{})...",
                attempt, config.max_attempts
            ));
        }

        // The previous key push may have aged out of its validity window.
        if failures_since_push >= 3 {
            push_key(cloud, vm, os_user, public_key).await;
            failures_since_push = 0;
        }

        if attempt < config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(config.max_delay);
        }
    }

    Err(OrchestratorError::SshNotReady {
        attempts: config.max_attempts,
    })
}

/// Push the ephemeral public key, if one is configured. Failures are
/// logged, not fatal: the probe or session that follows will surface a
/// real authentication problem.
pub(crate) async fn push_key<C: CloudAdapter>(
    cloud: &C,
    vm: &VmInfo,
    os_user: &str,
    public_key: Option<&str>,
) {
    let Some(key) = public_key else { return };
    let Some(ref az) = vm.az else {
        warn!(instance_id = %vm.instance_id, "no availability zone, skipping key push");
        return;
    };
    if let Err(e) = cloud
        .push_ephemeral_key(&vm.instance_id, az, os_user, key)
        .await
    {
        warn!(error = %e, "ephemeral key push failed");
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
