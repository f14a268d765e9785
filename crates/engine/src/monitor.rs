// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle-supervisor process control (the CLI side).
//!
//! The supervisor is a separate OS process that outlives the CLI. This
//! module owns the two host-wide coordination protocols:
//!
//! - Start: an exclusive flock on `monitor.lock` serializes concurrent
//!   CLIs; under the lock a live-PID check short-circuits, then the daemon
//!   is spawned detached (new process group, stdio closed, stderr into
//!   `monitor.log`) and its PID recorded.
//! - Stop: SIGTERM the recorded PID (stale PIDs are just cleaned up) and
//!   clear `idle_start`, which is what resets the grace period.

use chrono::Utc;
use fs2::FileExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use yg_storage::{ProjectStore, StoreError};

/// Hidden CLI subcommand that enters the daemon main loop.
pub const DAEMON_SUBCOMMAND: &str = "monitor-daemon";

/// Errors from supervisor control
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to spawn monitor daemon: {0}")]
    SpawnFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the idle supervisor for a project, unless one is already alive.
///
/// Returns `Ok` without spawning when another CLI holds the spawn lock or
/// a live daemon is recorded; both mean a supervisor exists or is being
/// created, which is all the caller needs.
pub fn start_monitor(
    store: &ProjectStore,
    project_hash: &str,
    grace_period: Duration,
) -> Result<(), MonitorError> {
    // 1. Serialize spawns host-wide. Non-blocking: losing the race means
    //    someone else is handling it.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(store.monitor_lock_path())?;
    if lock_file.try_lock_exclusive().is_err() {
        debug!("monitor lock held elsewhere, not spawning");
        return Ok(());
    }

    // 2. Under the lock: a recorded, live daemon wins.
    if let Some(pid) = store.load_monitor_pid()? {
        if process_exists(pid) {
            debug!(pid, "monitor daemon already running");
            return Ok(());
        }
        debug!(pid, "stale monitor PID, replacing");
    }

    // 3. Open the idle window before the daemon exists, so its first tick
    //    sees a timestamp.
    store.save_idle_start(Utc::now())?;

    // 4. Spawn detached: own process group, stdin/stdout closed, stderr
    //    appended to the log for post-mortem.
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(store.monitor_log_path())?;

    let binary = daemon_binary()?;
    let mut cmd = std::process::Command::new(binary);
    cmd.arg(DAEMON_SUBCOMMAND)
        .arg("--project-hash")
        .arg(project_hash)
        .arg("--state-dir")
        .arg(store.base_dir())
        .arg("--grace-period")
        .arg(format!("{}ms", grace_period.as_millis()))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log));
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd
        .spawn()
        .map_err(|e| MonitorError::SpawnFailed(e.to_string()))?;
    let pid = child.id();

    // 5. Record the PID, then drop the handle — the daemon is on its own.
    store.save_monitor_pid(pid)?;
    drop(child);

    info!(pid, grace_ms = grace_period.as_millis() as u64, "monitor daemon started");
    Ok(())
    // Lock released when lock_file closes.
}

/// Stop the supervisor if one is recorded. Best effort throughout: a
/// missing or dead daemon just means cleanup.
pub fn stop_monitor(store: &ProjectStore) -> Result<(), MonitorError> {
    let Some(pid) = store.load_monitor_pid()? else {
        return Ok(());
    };

    if !process_exists(pid) {
        debug!(pid, "monitor daemon already gone, clearing stale PID");
        store.clear_monitor_pid()?;
        return Ok(());
    }

    // SIGTERM delivery can race with the daemon's own exit; log, don't fail.
    if !kill_signal("-15", pid) {
        warn!(pid, "failed to signal monitor daemon");
    }
    store.clear_monitor_pid()?;
    store.clear_idle_start()?;
    info!(pid, "monitor daemon stopped");
    Ok(())
}

/// Resolve the binary to spawn as the daemon: explicit override first
/// (tests), then this executable.
fn daemon_binary() -> Result<PathBuf, MonitorError> {
    if let Ok(bin) = std::env::var("YEAGER_BIN") {
        return Ok(PathBuf::from(bin));
    }
    Ok(std::env::current_exe()?)
}

/// Check if a process with the given PID exists (signal-0 probe)
pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

/// Execute kill with the given signal and PID
fn kill_signal(signal: &str, pid: u32) -> bool {
    std::process::Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
