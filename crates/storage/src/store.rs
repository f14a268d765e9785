// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project state store.
//!
//! A directory of small files under `<base>/projects/<hash>/`. Every
//! mutation is write-temp-then-rename, so readers in other processes (the
//! monitor daemon, a second CLI) see either the old or the new contents,
//! never a partial write. The supervisor lock file is the only file not
//! written through here: the flock must be held on an open descriptor.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use yg_core::RunId;

/// Maximum number of retained run-history entries.
pub const HISTORY_CAP: usize = 20;

/// State files readable only by the owner.
const MODE_PRIVATE: u32 = 0o600;

/// Errors from state-store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file not found: {0}")]
    NotFound(PathBuf),

    #[error("corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("could not determine state directory")]
    NoStateDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the underlying file simply does not exist. Callers use
    /// this to distinguish "no VM yet" from real failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The persisted belief about which cloud instance belongs to a project.
///
/// Present iff a VM was successfully created at some past moment; the
/// instance may have since vanished in the cloud, which the orchestrator
/// treats as divergence to reconcile, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    pub instance_id: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub project_dir: PathBuf,
    pub setup_hash: String,
    pub cloud_init_version: u32,
}

/// One completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHistoryEntry {
    pub run_id: RunId,
    pub command: String,
    pub exit_code: i32,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Handle to one project's state directory.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    base: PathBuf,
    dir: PathBuf,
}

impl ProjectStore {
    /// Open (creating if needed) the store for `project_hash` under `base`.
    pub fn open(base: impl Into<PathBuf>, project_hash: &str) -> Result<Self, StoreError> {
        let base = base.into();
        let dir = base.join("projects").join(project_hash);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { base, dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// The per-project directory holding every state file.
    pub fn project_dir(&self) -> &Path {
        &self.dir
    }

    // --- VM record ---

    pub fn save_vm(&self, record: &VmRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)?;
        self.atomic_write(&self.dir.join("vm.json"), &json)
    }

    pub fn load_vm(&self) -> Result<VmRecord, StoreError> {
        let path = self.dir.join("vm.json");
        let content = read_or_not_found(&path)?;
        serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    pub fn delete_vm(&self) -> Result<(), StoreError> {
        remove_if_present(&self.dir.join("vm.json"))
    }

    // --- Last run pointer ---

    pub fn save_last_run(&self, run_id: &RunId) -> Result<(), StoreError> {
        let line = format!("{}\n", run_id);
        self.atomic_write(&self.dir.join("last_run"), line.as_bytes())
    }

    pub fn load_last_run(&self) -> Result<RunId, StoreError> {
        let path = self.dir.join("last_run");
        let content = read_or_not_found(&path)?;
        let text = String::from_utf8_lossy(&content);
        RunId::parse(text.trim()).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    // --- Run history ---

    /// Append an entry, newest first, dropping beyond [`HISTORY_CAP`].
    ///
    /// A corrupt existing file is reset rather than failing: history is
    /// best-effort bookkeeping and must never block a successful run.
    pub fn append_history(&self, entry: RunHistoryEntry) -> Result<(), StoreError> {
        let mut entries = match self.load_history() {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                warn!(error = %e, "corrupt run history, starting fresh");
                Vec::new()
            }
        };
        entries.insert(0, entry);
        entries.truncate(HISTORY_CAP);
        let json = serde_json::to_vec_pretty(&entries)?;
        self.atomic_write(&self.dir.join("history.json"), &json)
    }

    /// Load the history, newest first. Missing file is an empty history.
    pub fn load_history(&self) -> Result<Vec<RunHistoryEntry>, StoreError> {
        let path = self.dir.join("history.json");
        let content = match read_or_not_found(&path) {
            Ok(c) => c,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    // --- Idle timestamp ---

    pub fn save_idle_start(&self, t: DateTime<Utc>) -> Result<(), StoreError> {
        // Nanosecond RFC3339 so load/save round-trips exactly
        let line = t.to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.atomic_write(&self.dir.join("idle_start"), line.as_bytes())
    }

    /// `Ok(None)` when no idle window is open (missing file).
    pub fn load_idle_start(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let path = self.dir.join("idle_start");
        let content = match read_or_not_found(&path) {
            Ok(c) => c,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(&content);
        let parsed = DateTime::parse_from_rfc3339(text.trim()).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    pub fn clear_idle_start(&self) -> Result<(), StoreError> {
        remove_if_present(&self.dir.join("idle_start"))
    }

    // --- Supervisor coordination files ---

    pub fn monitor_lock_path(&self) -> PathBuf {
        self.dir.join("monitor.lock")
    }

    pub fn monitor_log_path(&self) -> PathBuf {
        self.dir.join("monitor.log")
    }

    pub fn monitor_pid_path(&self) -> PathBuf {
        self.dir.join("monitor.pid")
    }

    pub fn save_monitor_pid(&self, pid: u32) -> Result<(), StoreError> {
        let line = format!("{}\n", pid);
        self.atomic_write(&self.monitor_pid_path(), line.as_bytes())
    }

    /// `Ok(None)` when no daemon has been recorded (missing or unparsable
    /// file — an unparsable pid is indistinguishable from a dead daemon).
    pub fn load_monitor_pid(&self) -> Result<Option<u32>, StoreError> {
        let path = self.monitor_pid_path();
        let content = match read_or_not_found(&path) {
            Ok(c) => c,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(String::from_utf8_lossy(&content).trim().parse::<u32>().ok())
    }

    pub fn clear_monitor_pid(&self) -> Result<(), StoreError> {
        remove_if_present(&self.monitor_pid_path())
    }

    // --- Internals ---

    /// Write `target` atomically: temp file in the same directory, private
    /// mode, then rename. The temp file is removed if the rename fails.
    fn atomic_write(&self, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut tmp_name = target.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(MODE_PRIVATE)
                .open(&tmp)?;
            file.write_all(bytes)?;
        }

        if let Err(e) = std::fs::rename(&tmp, target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Resolve the default state base directory:
/// `YEAGER_STATE_DIR` > `$XDG_STATE_HOME/yeager` > `~/.local/state/yeager`.
pub fn default_base_dir() -> Result<PathBuf, StoreError> {
    if let Ok(dir) = std::env::var("YEAGER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("yeager"));
    }
    let home = std::env::var("HOME").map_err(|_| StoreError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/yeager"))
}

fn read_or_not_found(path: &Path) -> Result<Vec<u8>, StoreError> {
    match std::fs::read(path) {
        Ok(c) => Ok(c),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
