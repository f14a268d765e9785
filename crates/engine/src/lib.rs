// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! yg-engine: the remote-execution orchestration core.
//!
//! Composition, leaves first: the orchestrator maps a project to a live,
//! correctly-sized VM; the remote runtime hosts commands in detachable tmux
//! sessions; the monitor module spawns/stops the out-of-process idle
//! supervisor; the pipeline strings them together for one CLI invocation.

pub mod cloud_init;
pub mod idle;
pub mod keys;
pub mod monitor;
pub mod orchestrator;
pub mod pipeline;
pub mod readiness;
pub mod report;
pub mod runtime;
pub mod sync;
pub mod upload;

pub use cloud_init::{remote_project_dir, CLOUD_INIT_VERSION};
pub use idle::{IdleError, IdleWatcher, WatchOutcome};
pub use keys::{EphemeralKey, KeyError};
pub use monitor::{start_monitor, stop_monitor, MonitorError, DAEMON_SUBCOMMAND};
pub use orchestrator::{EnsureOutcome, Orchestrator, OrchestratorError};
pub use pipeline::{Pipeline, PipelineError, RunOutcome};
pub use readiness::{wait_ssh_ready, ReadinessConfig};
pub use report::{NullReporter, Reporter};
pub use runtime::{ActiveRun, RemoteRuntime, RunRequest, RunResult, RuntimeError};
pub use sync::{FileSync, RsyncSync, SyncError};
pub use upload::{run_key, validate_artifact_path};

#[cfg(any(test, feature = "test-support"))]
pub use report::RecordingReporter;
#[cfg(any(test, feature = "test-support"))]
pub use sync::FakeSync;
