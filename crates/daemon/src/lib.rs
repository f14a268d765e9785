// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! yg-daemon: the idle-stop monitor daemon.
//!
//! Entered through the CLI's hidden `monitor-daemon` subcommand as a
//! detached child of the CLI that spawned it. The only communication
//! channel with the rest of the system is the project state directory:
//! `idle_start` opens/closes the idle window, `monitor.pid` records this
//! process, and SIGTERM from any later CLI cancels the countdown.

mod env;

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use yg_adapters::subprocess::STOP_VM_TIMEOUT;
use yg_adapters::{AwsCliAdapter, CloudAdapter, FileFakeCloudAdapter};
use yg_storage::{ProjectStore, StoreError};

/// Arguments of the hidden `monitor-daemon` subcommand.
#[derive(Debug, Clone)]
pub struct DaemonArgs {
    pub project_hash: String,
    pub state_dir: PathBuf,
    pub grace_period: Duration,
}

/// Daemon errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install stderr logging for the daemon. The parent redirected stderr to
/// `monitor.log`, so this is what ends up there for post-mortems.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Daemon entrypoint: resolve the instance, pick the adapter, loop.
pub async fn run(args: DaemonArgs) -> Result<(), DaemonError> {
    let store = ProjectStore::open(&args.state_dir, &args.project_hash)?;

    let record = match store.load_vm() {
        Ok(record) => record,
        Err(e) if e.is_not_found() => {
            info!("no VM record, nothing to watch");
            let _ = store.clear_monitor_pid();
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        project_hash = %args.project_hash,
        instance_id = %record.instance_id,
        grace_ms = args.grace_period.as_millis() as u64,
        "monitor daemon watching"
    );

    if env::test_mode() {
        let cloud = FileFakeCloudAdapter::new(args.state_dir.join("fake-cloud"));
        run_loop(cloud, store, record.instance_id, args.grace_period).await
    } else {
        let cloud = AwsCliAdapter::new(record.region.clone());
        run_loop(cloud, store, record.instance_id, args.grace_period).await
    }
}

/// The timer loop: every check interval, compare the idle window against
/// the grace period and stop the VM when it has fully elapsed.
///
/// SIGTERM/SIGINT exit cleanly without a final stop: a cancelled
/// countdown means new activity arrived and the VM must stay up.
pub async fn run_loop<C: CloudAdapter>(
    cloud: C,
    store: ProjectStore,
    instance_id: String,
    grace_period: Duration,
) -> Result<(), DaemonError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut ticker = tokio::time::interval(env::check_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, exiting");
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("received SIGINT, exiting");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        // No open idle window means "not idle": a CLI cleared it (or it
        // never existed) and this daemon is living out its last moments.
        let idle_start = match store.load_idle_start() {
            Ok(Some(t)) => t,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "failed to read idle window");
                continue;
            }
        };

        let idle_for = (Utc::now() - idle_start).to_std().unwrap_or_default();
        if idle_for < grace_period {
            continue;
        }

        match tokio::time::timeout(STOP_VM_TIMEOUT, cloud.stop_vm(&instance_id)).await {
            Ok(Ok(())) => {
                info!(instance_id = %instance_id, "VM stopped after idle grace period");
                if let Err(e) = store.clear_monitor_pid() {
                    warn!(error = %e, "failed to remove PID file");
                }
                if let Err(e) = store.clear_idle_start() {
                    warn!(error = %e, "failed to clear idle window");
                }
                return Ok(());
            }
            Ok(Err(e)) => warn!(error = %e, "stop failed, retrying next tick"),
            Err(_) => warn!("stop timed out, retrying next tick"),
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
