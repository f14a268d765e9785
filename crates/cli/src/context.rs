// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared per-invocation context: project identity, config, state store,
//! cloud adapter, output writer, cancellation token.

use crate::exit_error::ExitError;
use crate::output::Output;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use yg_adapters::{classify, AwsCliAdapter, CloudAdapter, SshTransport, VmInfo, VmState};
use yg_core::{find_project_root, Config, Project, RunId};
use yg_engine::{remote_project_dir, EphemeralKey, RemoteRuntime};
use yg_storage::{default_base_dir, ProjectStore};

pub struct Context {
    pub project: Project,
    pub config: Config,
    pub store: ProjectStore,
    pub cloud: AwsCliAdapter,
    pub output: Output,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn resolve(output: Output, cancel: CancellationToken) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let root = find_project_root(&cwd);
        let project = Project::from_path(root);
        let config = Config::load(&project.abs_path)?;
        let store = ProjectStore::open(default_base_dir()?, &project.hash)?;
        let cloud = AwsCliAdapter::new(region());
        Ok(Self {
            project,
            config,
            store,
            cloud,
            output,
            cancel,
        })
    }

    pub fn reporter(&self) -> Arc<dyn yg_engine::Reporter> {
        Arc::new(self.output)
    }

    /// Resolve a run id argument, defaulting to the last recorded run.
    pub fn resolve_run_id(&self, arg: Option<&str>) -> Result<RunId> {
        match arg {
            Some(text) => Ok(RunId::parse(text)?),
            None => match self.store.load_last_run() {
                Ok(id) => Ok(id),
                Err(e) if e.is_not_found() => {
                    anyhow::bail!("no runs recorded for this project yet")
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Find the project VM, classifying provider failures.
    pub async fn find_vm(&self) -> Result<Option<VmInfo>> {
        self.cloud
            .find_vm(&self.project.hash)
            .await
            .map_err(|e| self.cloud_fail(e.to_string()))
    }

    /// Build an authenticated remote runtime against a running VM. The
    /// returned key must stay alive as long as the runtime is used.
    pub async fn remote_runtime(
        &self,
        vm: &VmInfo,
    ) -> Result<(RemoteRuntime<SshTransport>, EphemeralKey)> {
        anyhow::ensure!(
            vm.state == VmState::Running,
            "VM is {} (run `yg up` first)",
            vm.state
        );
        let host = vm
            .public_ip
            .clone()
            .ok_or_else(|| anyhow::anyhow!("VM is running but has no public IP"))?;

        let key = EphemeralKey::generate().await?;
        if let Some(ref az) = vm.az {
            self.cloud
                .push_ephemeral_key(&vm.instance_id, az, &self.config.os_user, key.public_key())
                .await
                .map_err(|e| self.cloud_fail(e.to_string()))?;
        }

        let transport = SshTransport::new(host, &self.config.os_user)
            .with_identity(key.private_key_path());
        let runtime = RemoteRuntime::new(transport, remote_project_dir(&self.config.os_user));
        Ok((runtime, key))
    }

    /// Render a classified provider failure once and convert it into a
    /// silent exit; unknown failures surface verbatim.
    pub fn cloud_fail(&self, raw: String) -> anyhow::Error {
        if let Some(advice) = classify(&raw) {
            self.output.error(&advice.message, Some(&advice.fix));
            return ExitError::silent(1).into();
        }
        anyhow::anyhow!(raw)
    }
}

/// Region resolution: standard environment first, then a fixed default.
fn region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}
