// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral SSH keypairs.
//!
//! One throwaway ed25519 keypair per CLI invocation. The public half is
//! pushed to the instance through the cloud's out-of-band channel (valid
//! for roughly 60 seconds); the private half never leaves the temp
//! directory, which is removed on drop.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use yg_adapters::subprocess::run_with_timeout;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("ssh-keygen failed: {0}")]
    Keygen(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A generated keypair living in a private temp directory.
pub struct EphemeralKey {
    dir: tempfile::TempDir,
    public_key: String,
}

impl EphemeralKey {
    pub async fn generate() -> Result<Self, KeyError> {
        let dir = tempfile::tempdir()?;
        let key_path = dir.path().join("yg_ed25519");

        let mut cmd = tokio::process::Command::new("ssh-keygen");
        cmd.args(["-q", "-t", "ed25519", "-N", "", "-C", "yeager-ephemeral", "-f"])
            .arg(&key_path);
        let output = run_with_timeout(cmd, Duration::from_secs(10), "ssh-keygen")
            .await
            .map_err(KeyError::Keygen)?;
        if !output.status.success() {
            return Err(KeyError::Keygen(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let public_key = std::fs::read_to_string(key_path.with_extension("pub"))?
            .trim()
            .to_string();
        Ok(Self { dir, public_key })
    }

    /// OpenSSH-format public key, as accepted by the cloud key push.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.path().join("yg_ed25519")
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
