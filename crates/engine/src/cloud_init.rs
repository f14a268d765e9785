// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud-init document generation.
//!
//! The rendered document provisions a fresh VM to the point where the
//! remote runtime's assumptions hold: bash, tmux, and rsync are installed
//! and the sync target directory exists.

use sha2::{Digest, Sha256};
use yg_core::Config;

/// Version of the provisioning template. Compared against the persisted VM
/// record; a mismatch means the VM was built by an incompatible template
/// and must be destroyed and recreated.
pub const CLOUD_INIT_VERSION: u32 = 3;

/// Packages the remote runtime and common builds rely on.
const BASE_PACKAGES: &[&str] = &["tmux", "rsync", "git", "build-essential", "curl", "unzip"];

/// Render the cloud-init document for a project VM.
pub fn render(config: &Config) -> String {
    let mut doc = String::from("#cloud-config\n");
    doc.push_str("package_update: true\n");
    doc.push_str("packages:\n");
    for pkg in BASE_PACKAGES {
        doc.push_str(&format!("  - {}\n", pkg));
    }
    doc.push_str("runcmd:\n");
    doc.push_str(&format!(
        "  - mkdir -p /home/{user}/project\n  - chown {user}:{user} /home/{user}/project\n",
        user = config.os_user
    ));
    doc
}

/// Fingerprint of the provisioning inputs, persisted in the VM record.
/// When it drifts from the current configuration the orchestrator suggests
/// a reprovision (soft notice, unlike the version check).
pub fn setup_hash(config: &Config) -> String {
    let digest = Sha256::digest(render(config).as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Directory on the VM that sync targets and sessions start in.
pub fn remote_project_dir(os_user: &str) -> String {
    format!("/home/{}/project", os_user)
}

#[cfg(test)]
#[path = "cloud_init_tests.rs"]
mod tests;
