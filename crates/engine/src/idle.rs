// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process idle watcher for `yg up --keep-alive`.
//!
//! Unlike the monitor daemon, this lives and dies with the CLI process: it
//! polls the VM for active `yg-` sessions and stops the instance once
//! `idle_stop` passes with none. It shares no state with the out-of-process
//! supervisor; different lifetime, different config knob.

use crate::runtime::RemoteRuntime;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use yg_adapters::{CloudAdapter, CloudError, Transport};
use yg_core::Clock;

/// Errors from the idle watcher
#[derive(Debug, Error)]
pub enum IdleError {
    #[error(transparent)]
    Cloud(#[from] CloudError),
}

/// Watches for inactivity and stops the VM.
pub struct IdleWatcher<C: CloudAdapter, T: Transport, K: Clock> {
    cloud: C,
    runtime: RemoteRuntime<T>,
    clock: K,
    idle_stop: Duration,
    check_interval: Duration,
}

/// How a watch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The VM was stopped after the idle window elapsed.
    Stopped,
    /// The watcher was cancelled (Ctrl-C) before stopping anything.
    Cancelled,
}

impl<C: CloudAdapter, T: Transport, K: Clock> IdleWatcher<C, T, K> {
    pub fn new(
        cloud: C,
        runtime: RemoteRuntime<T>,
        clock: K,
        idle_stop: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            cloud,
            runtime,
            clock,
            idle_stop,
            check_interval,
        }
    }

    /// Block until the VM is stopped for inactivity or `cancel` fires.
    pub async fn watch(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome, IdleError> {
        let mut last_active = self.clock.now();
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(WatchOutcome::Cancelled),
                _ = ticker.tick() => {}
            }

            let active = match self.runtime.list_runs().await {
                Ok(runs) => !runs.is_empty(),
                Err(e) => {
                    // A flaky transport must not stop a busy VM.
                    warn!(error = %e, "session poll failed, assuming activity");
                    true
                }
            };

            let now = self.clock.now();
            if active {
                last_active = now;
                continue;
            }

            let idle_for = (now - last_active).to_std().unwrap_or_default();
            debug!(idle_secs = idle_for.as_secs(), "VM idle");
            if idle_for >= self.idle_stop {
                self.cloud.stop_vm(instance_id).await?;
                return Ok(WatchOutcome::Stopped);
            }
        }
    }
}

#[cfg(test)]
#[path = "idle_tests.rs"]
mod tests;
