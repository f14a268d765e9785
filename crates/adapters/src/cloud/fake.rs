// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake cloud adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CloudAdapter, CloudError, CreateVm, Progress, VmInfo, VmState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Recorded cloud call
#[derive(Debug, Clone, PartialEq)]
pub enum CloudCall {
    EnsureSecurityGroup,
    EnsureBucket,
    CreateVm { project_hash: String, instance_type: String },
    FindVm { project_hash: String },
    StartVm { instance_id: String },
    StopVm { instance_id: String },
    TerminateVm { instance_id: String },
    WaitUntilRunning { instance_id: String },
    PushEphemeralKey { instance_id: String, os_user: String },
    PutObject { key: String, content_type: String },
    GetObject { key: String },
}

struct FakeCloudState {
    instances: HashMap<String, (String, VmInfo)>, // instance_id -> (project_hash, info)
    objects: HashMap<String, Vec<u8>>,
    calls: Vec<CloudCall>,
    fail_create: Option<String>,
    fail_stop: Option<String>,
    next_instance: u64,
}

/// In-memory fake cloud adapter for testing
#[derive(Clone)]
pub struct FakeCloudAdapter {
    region: String,
    inner: Arc<Mutex<FakeCloudState>>,
}

impl Default for FakeCloudAdapter {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl FakeCloudAdapter {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            inner: Arc::new(Mutex::new(FakeCloudState {
                instances: HashMap::new(),
                objects: HashMap::new(),
                calls: Vec::new(),
                fail_create: None,
                fail_stop: None,
                next_instance: 0,
            })),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<CloudCall> {
        self.inner.lock().calls.clone()
    }

    /// Seed a pre-existing instance for a project.
    pub fn add_instance(&self, project_hash: &str, info: VmInfo) {
        self.inner
            .lock()
            .instances
            .insert(info.instance_id.clone(), (project_hash.to_string(), info));
    }

    /// Flip an instance's lifecycle state.
    pub fn set_state(&self, instance_id: &str, state: VmState) {
        if let Some((_, info)) = self.inner.lock().instances.get_mut(instance_id) {
            info.state = state;
            if state == VmState::Running && info.public_ip.is_none() {
                info.public_ip = Some("10.0.0.1".to_string());
            }
        }
    }

    pub fn instance(&self, instance_id: &str) -> Option<VmInfo> {
        self.inner
            .lock()
            .instances
            .get(instance_id)
            .map(|(_, info)| info.clone())
    }

    /// Script the next create_vm call to fail with raw error text.
    pub fn fail_create_with(&self, raw: &str) {
        self.inner.lock().fail_create = Some(raw.to_string());
    }

    /// Script every stop_vm call to fail with raw error text.
    pub fn fail_stop_with(&self, raw: &str) {
        self.inner.lock().fail_stop = Some(raw.to_string());
    }

    /// Let stop_vm succeed again.
    pub fn clear_stop_failure(&self) {
        self.inner.lock().fail_stop = None;
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().objects.get(key).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Count of stop calls, for exactly-once assertions.
    pub fn stop_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, CloudCall::StopVm { .. }))
            .count()
    }
}

#[async_trait]
impl CloudAdapter for FakeCloudAdapter {
    async fn ensure_security_group(&self) -> Result<String, CloudError> {
        self.inner.lock().calls.push(CloudCall::EnsureSecurityGroup);
        Ok("sg-fake".to_string())
    }

    async fn ensure_bucket(&self) -> Result<(), CloudError> {
        self.inner.lock().calls.push(CloudCall::EnsureBucket);
        Ok(())
    }

    async fn create_vm(&self, req: &CreateVm) -> Result<VmInfo, CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::CreateVm {
            project_hash: req.project_hash.clone(),
            instance_type: req.instance_type.clone(),
        });

        if let Some(raw) = inner.fail_create.take() {
            return Err(CloudError::CommandFailed(raw));
        }

        inner.next_instance += 1;
        let info = VmInfo {
            instance_id: format!("i-fake{:012}", inner.next_instance),
            state: VmState::Running,
            public_ip: Some("10.0.0.1".to_string()),
            region: self.region.clone(),
            az: Some(format!("{}a", self.region)),
            instance_type: req.instance_type.clone(),
        };
        inner
            .instances
            .insert(info.instance_id.clone(), (req.project_hash.clone(), info.clone()));
        Ok(info)
    }

    async fn find_vm(&self, project_hash: &str) -> Result<Option<VmInfo>, CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::FindVm {
            project_hash: project_hash.to_string(),
        });
        Ok(inner
            .instances
            .values()
            .find(|(hash, info)| hash == project_hash && !info.state.is_gone())
            .map(|(_, info)| info.clone()))
    }

    async fn start_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::StartVm {
            instance_id: instance_id.to_string(),
        });
        match inner.instances.get_mut(instance_id) {
            Some((_, info)) => {
                info.state = VmState::Running;
                if info.public_ip.is_none() {
                    info.public_ip = Some("10.0.0.1".to_string());
                }
                Ok(())
            }
            None => Err(CloudError::InstanceNotFound(instance_id.to_string())),
        }
    }

    async fn stop_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::StopVm {
            instance_id: instance_id.to_string(),
        });
        if let Some(raw) = inner.fail_stop.clone() {
            return Err(CloudError::CommandFailed(raw));
        }
        match inner.instances.get_mut(instance_id) {
            Some((_, info)) => {
                info.state = VmState::Stopped;
                info.public_ip = None;
                Ok(())
            }
            None => Err(CloudError::InstanceNotFound(instance_id.to_string())),
        }
    }

    async fn terminate_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::TerminateVm {
            instance_id: instance_id.to_string(),
        });
        match inner.instances.get_mut(instance_id) {
            Some((_, info)) => {
                info.state = VmState::Terminated;
                info.public_ip = None;
                Ok(())
            }
            None => Err(CloudError::InstanceNotFound(instance_id.to_string())),
        }
    }

    async fn wait_until_running(
        &self,
        instance_id: &str,
        progress: Progress,
    ) -> Result<(), CloudError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(CloudCall::WaitUntilRunning {
                instance_id: instance_id.to_string(),
            });
            // Fakes reach running instantly; pending instances flip over.
            if let Some((_, info)) = inner.instances.get_mut(instance_id) {
                info.state = VmState::Running;
                if info.public_ip.is_none() {
                    info.public_ip = Some("10.0.0.1".to_string());
                }
            } else {
                return Err(CloudError::InstanceNotFound(instance_id.to_string()));
            }
        }
        progress(1);
        Ok(())
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn bucket_name(&self) -> Result<String, CloudError> {
        Ok("yeager-000000000000".to_string())
    }

    async fn account_id(&self) -> Result<String, CloudError> {
        Ok("000000000000".to_string())
    }

    async fn push_ephemeral_key(
        &self,
        instance_id: &str,
        _az: &str,
        os_user: &str,
        _public_key: &str,
    ) -> Result<(), CloudError> {
        self.inner.lock().calls.push(CloudCall::PushEphemeralKey {
            instance_id: instance_id.to_string(),
            os_user: os_user.to_string(),
        });
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::PutObject {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });
        inner.objects.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CloudError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CloudCall::GetObject {
            key: key.to_string(),
        });
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| CloudError::ObjectNotFound(key.to_string()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
