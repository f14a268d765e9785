// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration loaded from `yeager.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file name looked up at the project root.
pub const CONFIG_FILE: &str = "yeager.toml";

/// OS user provisioned on the VM and used for SSH.
pub const DEFAULT_OS_USER: &str = "ubuntu";

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key} duration: {message}")]
    InvalidDuration { key: &'static str, message: String },
    #[error("invalid size {0:?} (expected small, medium, large, or xlarge)")]
    InvalidSize(String),
}

/// VM size selector, mapped onto a concrete instance type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VmSize {
    Small,
    #[default]
    Medium,
    Large,
    Xlarge,
}

impl VmSize {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "xlarge" => Ok(Self::Xlarge),
            other => Err(ConfigError::InvalidSize(other.to_string())),
        }
    }

    /// The instance type expected for this size. The orchestrator compares
    /// this against the live instance to decide on reprovisioning.
    pub fn instance_type(self) -> &'static str {
        match self {
            Self::Small => "t4g.small",
            Self::Medium => "t4g.medium",
            Self::Large => "t4g.large",
            Self::Xlarge => "t4g.xlarge",
        }
    }
}

impl std::fmt::Display for VmSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        };
        write!(f, "{}", s)
    }
}

/// Raw file shape before validation.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    size: Option<String>,
    grace_period: Option<String>,
    idle_stop: Option<String>,
    artifacts: Option<Vec<String>>,
    os_user: Option<String>,
}

/// Resolved project configuration.
///
/// `grace_period` drives the out-of-process idle supervisor spawned after
/// each run; `idle_stop` drives the in-process watcher of
/// `up --keep-alive`. They are independent knobs with different lifetimes
/// and neither defaults from the other.
#[derive(Debug, Clone)]
pub struct Config {
    pub size: VmSize,
    /// Idle window before the supervisor stops the VM. `None` (missing or
    /// negative in the file) disables the supervisor entirely.
    pub grace_period: Option<Duration>,
    /// Idle window for `up --keep-alive`.
    pub idle_stop: Option<Duration>,
    /// Remote paths (relative to the project dir) uploaded after each run.
    pub artifacts: Vec<String>,
    pub os_user: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: VmSize::default(),
            grace_period: None,
            idle_stop: None,
            artifacts: Vec::new(),
            os_user: DEFAULT_OS_USER.to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from `<project_root>/yeager.toml`.
    ///
    /// A missing file yields the defaults; a present-but-invalid file is an
    /// error (silently ignoring a typo'd config would provision the wrong VM).
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read { path, source: e }),
        };
        let raw: RawConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse { path, source: e })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let size = match raw.size {
            Some(s) => VmSize::parse(&s)?,
            None => VmSize::default(),
        };
        Ok(Self {
            size,
            grace_period: parse_optional_duration("grace_period", raw.grace_period.as_deref())?,
            idle_stop: parse_optional_duration("idle_stop", raw.idle_stop.as_deref())?,
            artifacts: raw.artifacts.unwrap_or_default(),
            os_user: raw.os_user.unwrap_or_else(|| DEFAULT_OS_USER.to_string()),
        })
    }
}

/// Parse an optional duration key. A negative value means "disabled" and
/// maps to `None`, same as an absent key.
fn parse_optional_duration(
    key: &'static str,
    value: Option<&str>,
) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(s) if s.trim_start().starts_with('-') => Ok(None),
        Some(s) => parse_duration(s)
            .map(Some)
            .map_err(|message| ConfigError::InvalidDuration { key, message }),
    }
}

/// Parse a duration string like "30s", "5m", "1h" into a Duration
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the numeric prefix
    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "millisecond" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
