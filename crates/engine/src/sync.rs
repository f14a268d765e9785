// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File synchronization to the VM.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use yg_adapters::subprocess::run_with_timeout;

/// Errors from file synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync failed: {0}")]
    Failed(String),
}

/// Delta-copies the local working tree onto the VM.
#[async_trait]
pub trait FileSync: Clone + Send + Sync + 'static {
    async fn sync(
        &self,
        local_dir: &Path,
        user: &str,
        host: &str,
        remote_dir: &str,
    ) -> Result<(), SyncError>;
}

/// rsync-over-ssh synchronizer.
#[derive(Debug, Clone, Default)]
pub struct RsyncSync {
    identity: Option<PathBuf>,
}

impl RsyncSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// Upper bound for one sync pass; large first pushes stay under it on any
/// sane uplink, and a hung transport should not wedge the CLI.
const SYNC_TIMEOUT: Duration = Duration::from_secs(600);

#[async_trait]
impl FileSync for RsyncSync {
    async fn sync(
        &self,
        local_dir: &Path,
        user: &str,
        host: &str,
        remote_dir: &str,
    ) -> Result<(), SyncError> {
        let mut ssh = String::from(
            "ssh -o BatchMode=yes -o StrictHostKeyChecking=accept-new -o LogLevel=ERROR",
        );
        if let Some(ref identity) = self.identity {
            ssh.push_str(&format!(" -i {}", identity.display()));
        }

        let mut cmd = tokio::process::Command::new("rsync");
        cmd.arg("-az")
            .arg("--delete")
            .args(["--exclude", ".git/"])
            .args(["--exclude", "target/"])
            .args(["--exclude", "node_modules/"])
            .arg("-e")
            .arg(ssh)
            // Trailing slash: copy contents, not the directory itself.
            .arg(format!("{}/", local_dir.display()))
            .arg(format!("{}@{}:{}/", user, host, remote_dir));

        debug!(host, remote_dir, "syncing working tree");
        let output = run_with_timeout(cmd, SYNC_TIMEOUT, "rsync")
            .await
            .map_err(SyncError::Failed)?;
        if !output.status.success() {
            return Err(SyncError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSync;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{FileSync, SyncError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::Arc;

    /// Recording fake synchronizer.
    #[derive(Clone, Default)]
    pub struct FakeSync {
        inner: Arc<Mutex<FakeSyncState>>,
    }

    #[derive(Default)]
    struct FakeSyncState {
        syncs: Vec<String>,
        fail_with: Option<String>,
    }

    impl FakeSync {
        pub fn new() -> Self {
            Self::default()
        }

        /// Recorded `user@host:remote_dir` targets, in order.
        pub fn targets(&self) -> Vec<String> {
            self.inner.lock().syncs.clone()
        }

        pub fn fail_with(&self, message: &str) {
            self.inner.lock().fail_with = Some(message.to_string());
        }
    }

    #[async_trait]
    impl FileSync for FakeSync {
        async fn sync(
            &self,
            _local_dir: &Path,
            user: &str,
            host: &str,
            remote_dir: &str,
        ) -> Result<(), SyncError> {
            let mut inner = self.inner.lock();
            if let Some(ref message) = inner.fail_with {
                return Err(SyncError::Failed(message.clone()));
            }
            inner.syncs.push(format!("{}@{}:{}", user, host, remote_dir));
            Ok(())
        }
    }
}
