//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for testing yg CLI behavior.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Fast daemon cadence for specs.
pub const SPEC_CHECK_INTERVAL: &str = "20ms";

/// Spec polling knobs.
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// An RFC3339 timestamp comfortably in the past, for pre-opened idle
/// windows.
pub const LONG_AGO: &str = "2020-01-01T00:00:00.000000000Z";

/// Returns the path to the yg binary, checking llvm-cov target directory
/// first so coverage runs work too. Falls back to resolving relative to
/// the test binary itself when CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>; its
    // grandparent is target/debug/ where yg is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the yg binary.
pub fn yg_binary() -> PathBuf {
    binary_path("yg")
}

/// Create a CLI builder for yg commands
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
        }
    }

    /// Add CLI arguments
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set working directory
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    /// Set environment variable
    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> Command {
        let mut cmd = Command::new(yg_binary());
        cmd.args(&self.args);

        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }

        // Keep host state and credentials out of specs.
        cmd.env_remove("YEAGER_STATE_DIR");
        cmd.env_remove("YEAGER_TEST_MODE");
        cmd.env_remove("AWS_PROFILE");

        for (key, value) in self.envs {
            cmd.env(key, value);
        }

        cmd
    }

    /// Run and expect success (exit code 0)
    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect failure (non-zero exit code)
    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// Assert stdout contains substring.
    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    /// Assert stdout does not contain substring.
    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout should not contain '{}'\nstdout: {}",
            unexpected,
            stdout
        );
        self
    }

    /// Assert stderr contains substring.
    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll_interval = std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

// =============================================================================
// Project
// =============================================================================

/// Temporary test project with an isolated state directory.
pub struct Project {
    dir: tempfile::TempDir,
    state_dir: tempfile::TempDir,
}

/// Project hash used by daemon specs that bypass project resolution.
pub const TEST_HASH: &str = "abc123def456";

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            state_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Write a file at the given path (parents created automatically)
    pub fn file(&self, path: impl AsRef<Path>, content: &str) {
        let full_path = self.dir.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    /// Run yg in this project's context
    pub fn yg(&self) -> CliBuilder {
        cli()
            .pwd(self.path())
            .env("YEAGER_STATE_DIR", self.state_path())
    }

    /// Per-project state directory for [`TEST_HASH`]
    pub fn project_state(&self) -> PathBuf {
        self.state_path().join("projects").join(TEST_HASH)
    }

    /// Seed a VM record for [`TEST_HASH`], as the orchestrator would have
    /// persisted it.
    pub fn seed_vm_record(&self, instance_id: &str) {
        let dir = self.project_state();
        std::fs::create_dir_all(&dir).unwrap();
        let record = serde_json::json!({
            "instance_id": instance_id,
            "region": "us-east-1",
            "created_at": "2026-01-01T00:00:00Z",
            "project_dir": self.path().to_string_lossy(),
            "setup_hash": "f00dfeed1234",
            "cloud_init_version": 3,
        });
        std::fs::write(
            dir.join("vm.json"),
            serde_json::to_vec_pretty(&record).unwrap(),
        )
        .unwrap();
    }

    /// Open the idle window far in the past so the grace period has
    /// always elapsed.
    pub fn seed_idle_start(&self) {
        let dir = self.project_state();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("idle_start"), LONG_AGO).unwrap();
    }

    /// Seed a file-backed fake instance (what the daemon sees under
    /// YEAGER_TEST_MODE).
    pub fn seed_fake_instance(&self, instance_id: &str, state: &str) {
        let dir = self.state_path().join("fake-cloud").join("instances");
        std::fs::create_dir_all(&dir).unwrap();
        let instance = serde_json::json!({
            "instance_id": instance_id,
            "project_hash": TEST_HASH,
            "state": state,
            "public_ip": if state == "running" { Some("10.0.0.1") } else { None },
            "region": "us-east-1",
            "az": "us-east-1a",
            "instance_type": "t4g.medium",
        });
        std::fs::write(
            dir.join(format!("{}.json", instance_id)),
            serde_json::to_vec_pretty(&instance).unwrap(),
        )
        .unwrap();
    }

    /// Read the fake instance's current lifecycle state.
    pub fn fake_instance_state(&self, instance_id: &str) -> Option<String> {
        let path = self
            .state_path()
            .join("fake-cloud")
            .join("instances")
            .join(format!("{}.json", instance_id));
        let content = std::fs::read(path).ok()?;
        let value: serde_json::Value = serde_json::from_slice(&content).ok()?;
        value["state"].as_str().map(String::from)
    }

    pub fn idle_start_exists(&self) -> bool {
        self.project_state().join("idle_start").exists()
    }

    pub fn monitor_pid_exists(&self) -> bool {
        self.project_state().join("monitor.pid").exists()
    }

    /// Spawn the monitor daemon directly, as the CLI's supervisor Start
    /// path would.
    pub fn spawn_daemon(&self, grace: &str) -> std::process::Child {
        let mut cmd = Command::new(yg_binary());
        cmd.args([
            "monitor-daemon",
            "--project-hash",
            TEST_HASH,
            "--state-dir",
            &self.state_path().to_string_lossy(),
            "--grace-period",
            grace,
        ])
        .env("YEAGER_TEST_MODE", "1")
        .env("YEAGER_CHECK_INTERVAL", SPEC_CHECK_INTERVAL)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
        cmd.spawn().expect("daemon should spawn")
    }
}
