// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud provider adapters.
//!
//! The rest of the program depends only on the [`CloudAdapter`] trait; the
//! AWS implementation shells out to the `aws` CLI, which is the external
//! SDK surface.

mod aws;
mod classify;
mod file_fake;

pub use aws::AwsCliAdapter;
pub use classify::{classify, Advice};
pub use file_fake::FileFakeCloudAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CloudCall, FakeCloudAdapter};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from cloud operations
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{0}")]
    CommandFailed(String),
    #[error("unexpected cloud response: {0}")]
    BadResponse(String),
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("timed out waiting for instance {0} to reach running")]
    WaitTimeout(String),
    #[error("object not found: {0}")]
    ObjectNotFound(String),
}

/// Lifecycle state of a cloud instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl VmState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "shutting-down" => Some(Self::ShuttingDown),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }

    /// Terminated and shutting-down instances are invisible to
    /// [`CloudAdapter::find_vm`]; they no longer belong to the project.
    pub fn is_gone(self) -> bool {
        matches!(self, Self::Terminated | Self::ShuttingDown)
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live instance description, re-queried on every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VmInfo {
    pub instance_id: String,
    pub state: VmState,
    pub public_ip: Option<String>,
    pub region: String,
    pub az: Option<String>,
    pub instance_type: String,
}

/// Inputs for launching a project VM.
#[derive(Debug, Clone)]
pub struct CreateVm {
    pub project_hash: String,
    pub project_path: PathBuf,
    pub instance_type: String,
    pub security_group_id: String,
    /// Base64-encoded cloud-init document
    pub user_data: String,
}

/// Progress callback for long waits; receives the attempt number.
pub type Progress = Arc<dyn Fn(u32) + Send + Sync>;

/// Lifecycle and identity operations the core depends on.
#[async_trait]
pub trait CloudAdapter: Clone + Send + Sync + 'static {
    /// Idempotently ensure the shared security group (TCP 22 and 443
    /// ingress) exists, returning its id.
    async fn ensure_security_group(&self) -> Result<String, CloudError>;

    /// Idempotently ensure the artifact bucket exists with a 30-day object
    /// expiration.
    async fn ensure_bucket(&self) -> Result<(), CloudError>;

    /// Launch a VM tagged with the project identity.
    async fn create_vm(&self, req: &CreateVm) -> Result<VmInfo, CloudError>;

    /// Find the project's instance by tag, excluding instances that are
    /// terminated or shutting down. `None` when no live instance exists.
    async fn find_vm(&self, project_hash: &str) -> Result<Option<VmInfo>, CloudError>;

    async fn start_vm(&self, instance_id: &str) -> Result<(), CloudError>;

    async fn stop_vm(&self, instance_id: &str) -> Result<(), CloudError>;

    async fn terminate_vm(&self, instance_id: &str) -> Result<(), CloudError>;

    /// Poll until the instance reports running, emitting progress ticks.
    async fn wait_until_running(
        &self,
        instance_id: &str,
        progress: Progress,
    ) -> Result<(), CloudError>;

    fn region(&self) -> &str;

    /// Name of the artifact bucket.
    async fn bucket_name(&self) -> Result<String, CloudError>;

    async fn account_id(&self) -> Result<String, CloudError>;

    /// Push a short-lived public key to the instance OS user (valid for
    /// roughly 60 seconds at the cloud edge).
    async fn push_ephemeral_key(
        &self,
        instance_id: &str,
        az: &str,
        os_user: &str,
        public_key: &str,
    ) -> Result<(), CloudError>;

    /// Upload an object into the artifact bucket.
    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), CloudError>;

    /// Download an object from the artifact bucket.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CloudError>;
}
