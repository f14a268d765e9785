// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity derivation.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Number of hex characters kept from the path digest.
const HASH_LEN: usize = 12;

/// Identity of a local project directory.
///
/// Derived purely from the absolute path. The hash keys every piece of
/// per-project state on this host (state-store directory, instance tags);
/// the display name labels object-storage prefixes and user-facing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Normalized absolute path of the project directory
    pub abs_path: PathBuf,
    /// First 12 hex characters of SHA-256 over the normalized path
    pub hash: String,
    /// Basename of the project directory
    pub display_name: String,
}

impl Project {
    /// Derive a project identity from an absolute directory path.
    ///
    /// Deterministic: the same path always yields the same hash, so repeat
    /// invocations find the same VM record and state directory.
    pub fn from_path(abs_path: impl Into<PathBuf>) -> Self {
        let abs_path = normalize(&abs_path.into());
        let digest = Sha256::digest(abs_path.to_string_lossy().as_bytes());
        let hash = hex_prefix(&digest, HASH_LEN);
        let display_name = abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string();
        Self {
            abs_path,
            hash,
            display_name,
        }
    }
}

/// Collapse `.` components and trailing slashes so that spelling variants
/// of the same directory hash identically.
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(n + 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
        if out.len() >= n {
            break;
        }
    }
    out.truncate(n);
    out
}

/// Find the project root by walking up from `start`, looking for a
/// `yeager.toml`. Falls back to `start` itself when none is found, so a
/// project does not need a config file to get a VM.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(crate::config::CONFIG_FILE).is_file() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
