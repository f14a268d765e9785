// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VM lifecycle orchestration.
//!
//! Maps a project onto a live, correctly-sized instance. The local VM
//! record and the cloud may diverge (the instance can vanish out-of-band);
//! divergence is reconciled on every invocation and is not an error.

use crate::cloud_init::{self, CLOUD_INIT_VERSION};
use crate::report::Reporter;
use base64::Engine as _;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use yg_adapters::{CloudAdapter, CloudError, CreateVm, Progress, VmInfo, VmState};
use yg_core::{Config, Project};
use yg_storage::{ProjectStore, StoreError, VmRecord};

/// Errors from orchestration
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(
        "this VM was provisioned by an incompatible Yeager version \
         (cloud-init v{actual}, current v{expected}); run `yg destroy --force` and retry"
    )]
    CloudInitOutdated { actual: u32, expected: u32 },

    #[error("instance {0} vanished while starting")]
    InstanceVanished(String),

    #[error(
        "SSH did not become ready after {attempts} attempts; \
         provisioning may still be in progress — retry in a minute"
    )]
    SshNotReady { attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A running VM plus whether it was (re)created by this invocation.
#[derive(Debug, Clone)]
pub struct EnsureOutcome {
    pub info: VmInfo,
    pub fresh: bool,
}

/// Drives the project → running-VM state machine.
pub struct Orchestrator<C: CloudAdapter> {
    cloud: C,
    store: ProjectStore,
    reporter: Arc<dyn Reporter>,
}

impl<C: CloudAdapter> Orchestrator<C> {
    pub fn new(cloud: C, store: ProjectStore, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            cloud,
            store,
            reporter,
        }
    }

    /// Produce a running instance matching the current configuration.
    ///
    /// Idempotent on an already-running, correctly-sized VM: returns
    /// `fresh = false` without mutating anything.
    pub async fn ensure_vm_running(
        &self,
        project: &Project,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome, OrchestratorError> {
        let record = match self.store.load_vm() {
            Ok(record) => Some(record),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let Some(record) = record else {
            return self.create(project, config, cancel).await;
        };

        let live = with_cancel(cancel, self.cloud.find_vm(&project.hash)).await?;
        let Some(vm) = live else {
            info!(
                instance_id = %record.instance_id,
                "VM record exists but the instance is gone, recreating"
            );
            return self.create(project, config, cancel).await;
        };

        let expected_type = config.size.instance_type();
        match vm.state {
            VmState::Running => {
                if record.cloud_init_version != CLOUD_INIT_VERSION {
                    return Err(OrchestratorError::CloudInitOutdated {
                        actual: record.cloud_init_version,
                        expected: CLOUD_INIT_VERSION,
                    });
                }
                if record.setup_hash != cloud_init::setup_hash(config) {
                    self.reporter.warn(
                        "VM setup has drifted from the current configuration; \
                         run `yg destroy --force` to reprovision",
                    );
                }
                if vm.instance_type != expected_type {
                    self.notice_size_change(&vm.instance_type, expected_type);
                    return self.replace(&vm, project, config, cancel).await;
                }
                Ok(EnsureOutcome {
                    info: vm,
                    fresh: false,
                })
            }

            VmState::Stopped => {
                if vm.instance_type != expected_type {
                    self.notice_size_change(&vm.instance_type, expected_type);
                    return self.replace(&vm, project, config, cancel).await;
                }
                self.reporter.info("starting VM...");
                with_cancel(cancel, self.cloud.start_vm(&vm.instance_id)).await?;
                self.wait_running(&vm.instance_id, cancel).await?;
                let info = self.refind(project).await?;
                Ok(EnsureOutcome { info, fresh: false })
            }

            VmState::Pending => {
                self.wait_running(&vm.instance_id, cancel).await?;
                let info = self.refind(project).await?;
                Ok(EnsureOutcome { info, fresh: false })
            }

            other => {
                warn!(
                    state = %other,
                    instance_id = %vm.instance_id,
                    "instance in unexpected state, recreating"
                );
                self.create(project, config, cancel).await
            }
        }
    }

    fn notice_size_change(&self, actual: &str, expected: &str) {
        self.reporter.info(&format!(
            "size changed ({} -> {}); replacing the VM",
            actual, expected
        ));
    }

    /// Terminate the mis-sized instance, then create its replacement.
    async fn replace(
        &self,
        vm: &VmInfo,
        project: &Project,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome, OrchestratorError> {
        with_cancel(cancel, self.cloud.terminate_vm(&vm.instance_id)).await?;
        self.store.delete_vm()?;
        self.create(project, config, cancel).await
    }

    /// The Create path: render provisioning inputs, ensure shared
    /// resources, launch, wait, re-query for the public IP, persist.
    async fn create(
        &self,
        project: &Project,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome, OrchestratorError> {
        self.reporter
            .info("provisioning a new VM (the first run takes a minute or two)...");

        let document = cloud_init::render(config);
        let user_data = base64::engine::general_purpose::STANDARD.encode(document);

        let sg_id = with_cancel(cancel, self.cloud.ensure_security_group()).await?;
        with_cancel(cancel, self.cloud.ensure_bucket()).await?;

        let req = CreateVm {
            project_hash: project.hash.clone(),
            project_path: project.abs_path.clone(),
            instance_type: config.size.instance_type().to_string(),
            security_group_id: sg_id,
            user_data,
        };
        let created = with_cancel(cancel, self.cloud.create_vm(&req)).await?;
        info!(instance_id = %created.instance_id, "instance launched");

        self.wait_running(&created.instance_id, cancel).await?;
        // Re-query: the launch response predates IP/AZ assignment.
        let vm = self.refind(project).await?;

        self.store.save_vm(&VmRecord {
            instance_id: vm.instance_id.clone(),
            region: self.cloud.region().to_string(),
            created_at: Utc::now(),
            project_dir: project.abs_path.clone(),
            setup_hash: cloud_init::setup_hash(config),
            cloud_init_version: CLOUD_INIT_VERSION,
        })?;

        Ok(EnsureOutcome {
            info: vm,
            fresh: true,
        })
    }

    async fn wait_running(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let reporter = Arc::clone(&self.reporter);
        let progress: Progress = Arc::new(move |tick| {
            if tick % 5 == 0 {
                reporter.info("still waiting for the VM to start...");
            }
        });
        with_cancel(cancel, self.cloud.wait_until_running(instance_id, progress)).await
    }

    async fn refind(&self, project: &Project) -> Result<VmInfo, OrchestratorError> {
        self.cloud
            .find_vm(&project.hash)
            .await?
            .ok_or_else(|| OrchestratorError::InstanceVanished(project.hash.clone()))
    }

    /// Remove the VM entirely: terminate the instance (if any) and delete
    /// the local record. Used by `yg destroy`.
    pub async fn destroy(&self, project: &Project) -> Result<Option<String>, OrchestratorError> {
        let live = self.cloud.find_vm(&project.hash).await?;
        let terminated = match live {
            Some(vm) => {
                self.cloud.terminate_vm(&vm.instance_id).await?;
                Some(vm.instance_id)
            }
            None => None,
        };
        self.store.delete_vm()?;
        Ok(terminated)
    }
}

/// Race a cloud call against cancellation.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, CloudError>>,
) -> Result<T, OrchestratorError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
        result = fut => Ok(result?),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
