// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run pipeline: one CLI invocation end to end.
//!
//! Linear sequence over the other components: cancel any pending
//! idle-stop, ensure a running VM, sync the tree, run the command in a
//! detached session while streaming output, then record history, upload
//! outputs and artifacts (best effort), and hand the VM to the idle
//! supervisor. Cancellation is interpreted differently in exactly one
//! place: during the remote run it means "detach", everywhere else it is
//! an error.

use crate::cloud_init;
use crate::monitor;
use crate::orchestrator::{EnsureOutcome, Orchestrator, OrchestratorError};
use crate::readiness::{self, ReadinessConfig};
use crate::report::Reporter;
use crate::runtime::{RemoteRuntime, RunRequest, RuntimeError};
use crate::sync::{FileSync, SyncError};
use crate::upload;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use yg_adapters::{classify, CloudAdapter, Transport, VmInfo};
use yg_core::{Config, Project, RunId};
use yg_storage::{ProjectStore, RunHistoryEntry, StoreError};

/// Errors that fail the invocation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("VM is running but has no public IP")]
    NoPublicIp,
    #[error("operation cancelled")]
    Cancelled,
    /// Already rendered to the user by the classifier; the top-level
    /// handler must not print it again.
    #[error("error already reported")]
    Displayed,
}

impl PipelineError {
    pub fn is_displayed(&self) -> bool {
        matches!(self, Self::Displayed)
    }
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code to report for the process; the remote command's own code,
    /// or 0 when detached.
    pub exit_code: i32,
    pub detached: bool,
    pub run_id: RunId,
}

/// One CLI invocation's composition of the core components.
pub struct Pipeline<C, T, F, S>
where
    C: CloudAdapter,
    T: Transport,
    F: Fn(&VmInfo) -> T + Send + Sync,
    S: FileSync,
{
    cloud: C,
    connect: F,
    sync: S,
    store: ProjectStore,
    project: Project,
    config: Config,
    reporter: Arc<dyn Reporter>,
    readiness: ReadinessConfig,
    /// Ephemeral public key pushed before connecting; `None` relies on
    /// pre-installed keys (tests, custom images).
    public_key: Option<String>,
}

impl<C, T, F, S> Pipeline<C, T, F, S>
where
    C: CloudAdapter,
    T: Transport,
    F: Fn(&VmInfo) -> T + Send + Sync,
    S: FileSync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cloud: C,
        connect: F,
        sync: S,
        store: ProjectStore,
        project: Project,
        config: Config,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            cloud,
            connect,
            sync,
            store,
            project,
            config,
            reporter,
            readiness: ReadinessConfig::default(),
            public_key: None,
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    fn orchestrator(&self) -> Orchestrator<C> {
        Orchestrator::new(
            self.cloud.clone(),
            self.store.clone(),
            Arc::clone(&self.reporter),
        )
    }

    /// Ensure the VM is up (used by `yg up` and as pipeline step 2).
    pub async fn ensure_up(
        &self,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome, PipelineError> {
        self.orchestrator()
            .ensure_vm_running(&self.project, &self.config, cancel)
            .await
            .map_err(|e| self.classified(e))
    }

    /// Run one command through the whole pipeline.
    pub async fn run(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        // 1. New activity cancels any pending idle stop; best effort.
        if let Err(e) = monitor::stop_monitor(&self.store) {
            warn!(error = %e, "failed to cancel idle supervisor");
        }

        // 2. Ensure a running, correctly-sized VM.
        let ensured = self.ensure_up(cancel).await?;
        let vm = ensured.info;
        let host = vm.public_ip.clone().ok_or(PipelineError::NoPublicIp)?;
        let transport = (self.connect)(&vm);

        if ensured.fresh {
            // A just-created instance reports running before sshd is up.
            readiness::wait_ssh_ready(
                &self.cloud,
                &transport,
                &vm,
                &self.config.os_user,
                self.public_key.as_deref(),
                self.readiness,
                self.reporter.as_ref(),
                cancel,
            )
            .await
            .map_err(|e| self.classified(e))?;
        } else {
            readiness::push_key(&self.cloud, &vm, &self.config.os_user, self.public_key.as_deref())
                .await;
        }

        // 3. Sync the working tree.
        let remote_dir = cloud_init::remote_project_dir(&self.config.os_user);
        tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.sync.sync(&self.project.abs_path, &self.config.os_user, &host, &remote_dir) => result?,
        }

        // 4-5. Launch and stream; tee output into the upload buffer.
        let run_id = RunId::generate();
        let runtime = RemoteRuntime::new(transport, remote_dir);
        let req = RunRequest {
            command: command.to_string(),
            run_id: run_id.clone(),
        };
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        let mut captured: Vec<u8> = Vec::new();
        let mut rx_open = true;

        let run_fut = runtime.run(&req, tx);
        tokio::pin!(run_fut);

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // 6. Detach: the remote session keeps running. The run
                    // id is still recorded so `yg logs` / `yg kill` find it.
                    self.store.save_last_run(&run_id)?;
                    self.reporter
                        .info("detached; command still running on the VM (use `yg logs` to re-attach)");
                    return Ok(RunOutcome {
                        exit_code: 0,
                        detached: true,
                        run_id,
                    });
                }
                chunk = rx.recv(), if rx_open => {
                    match chunk {
                        Some(chunk) => {
                            self.reporter.stream(&chunk);
                            captured.extend_from_slice(&chunk);
                        }
                        None => rx_open = false,
                    }
                }
                result = &mut run_fut => {
                    // Drain whatever the streamer sent before finishing.
                    while let Ok(chunk) = rx.try_recv() {
                        self.reporter.stream(&chunk);
                        captured.extend_from_slice(&chunk);
                    }
                    break result?;
                }
            }
        };

        // 7. Bookkeeping and best-effort uploads.
        self.store.save_last_run(&run_id)?;
        let duration_ms = (result.end - result.start).num_milliseconds().max(0) as u64;
        if let Err(e) = self.store.append_history(RunHistoryEntry {
            run_id: run_id.clone(),
            command: command.to_string(),
            exit_code: result.exit_code,
            start_time: result.start,
            duration_ms,
        }) {
            warn!(error = %e, "failed to record run history");
        }

        if let Err(e) = upload::upload_outputs(
            &self.cloud,
            &self.project.display_name,
            &run_id,
            command,
            &captured,
            b"",
            &result,
        )
        .await
        {
            self.reporter
                .warn(&format!("output upload failed: {}", e));
        }
        upload::upload_artifacts(
            &self.cloud,
            &runtime,
            &self.project.display_name,
            &run_id,
            &self.config.artifacts,
            self.reporter.as_ref(),
        )
        .await;

        // 8. Hand the VM to the idle supervisor if nothing else is running.
        if let Some(grace) = self.config.grace_period {
            match runtime.list_runs().await {
                Ok(runs) if runs.is_empty() => {
                    if let Err(e) = monitor::start_monitor(&self.store, &self.project.hash, grace) {
                        warn!(error = %e, "failed to start idle supervisor");
                    }
                }
                Ok(runs) => {
                    debug!(active = runs.len(), "sessions still active, no idle supervisor");
                }
                Err(e) => warn!(error = %e, "session poll failed, no idle supervisor"),
            }
        }

        Ok(RunOutcome {
            exit_code: result.exit_code,
            detached: false,
            run_id,
        })
    }

    /// Render a classified cloud failure once, marking the error as
    /// displayed; unknown failures pass through for the top level to print.
    fn classified(&self, err: OrchestratorError) -> PipelineError {
        if let Some(advice) = classify(&err.to_string()) {
            self.reporter.error(&advice.message, Some(&advice.fix));
            return PipelineError::Displayed;
        }
        err.into()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
