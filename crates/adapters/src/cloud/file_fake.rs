// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed fake cloud adapter.
//!
//! Same behavior as the in-memory fake, but with instance state on disk so
//! a *separate process* (the monitor daemon under `YEAGER_TEST_MODE`) can
//! mutate it and the spawning test can observe the result. Compiled
//! unconditionally: the production binary constructs it when the env var is
//! set.

use super::{CloudAdapter, CloudError, CreateVm, Progress, VmInfo, VmState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct InstanceFile {
    instance_id: String,
    project_hash: String,
    state: String,
    public_ip: Option<String>,
    region: String,
    az: Option<String>,
    instance_type: String,
}

impl InstanceFile {
    fn info(&self) -> Option<VmInfo> {
        Some(VmInfo {
            instance_id: self.instance_id.clone(),
            state: VmState::parse(&self.state)?,
            public_ip: self.public_ip.clone(),
            region: self.region.clone(),
            az: self.az.clone(),
            instance_type: self.instance_type.clone(),
        })
    }
}

/// Cloud adapter persisting fake state under a directory.
#[derive(Debug, Clone)]
pub struct FileFakeCloudAdapter {
    dir: PathBuf,
    region: String,
}

impl FileFakeCloudAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            region: "us-east-1".to_string(),
        }
    }

    fn instances_dir(&self) -> PathBuf {
        self.dir.join("instances")
    }

    fn instance_path(&self, instance_id: &str) -> PathBuf {
        self.instances_dir().join(format!("{}.json", instance_id))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.dir.join("objects").join(key)
    }

    /// Seed an instance, for tests arranging a pre-existing VM.
    pub fn seed_instance(
        &self,
        instance_id: &str,
        project_hash: &str,
        state: VmState,
        instance_type: &str,
    ) -> std::io::Result<()> {
        let file = InstanceFile {
            instance_id: instance_id.to_string(),
            project_hash: project_hash.to_string(),
            state: state.as_str().to_string(),
            public_ip: (state == VmState::Running).then(|| "10.0.0.1".to_string()),
            region: self.region.clone(),
            az: Some(format!("{}a", self.region)),
            instance_type: instance_type.to_string(),
        };
        self.write_instance(&file)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    /// Read an instance's current lifecycle state straight from disk.
    pub fn read_state(&self, instance_id: &str) -> Option<VmState> {
        let file = self.read_instance(instance_id).ok()??;
        VmState::parse(&file.state)
    }

    fn read_instance(&self, instance_id: &str) -> Result<Option<InstanceFile>, CloudError> {
        let path = self.instance_path(instance_id);
        let content = match std::fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CloudError::CommandFailed(e.to_string())),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| CloudError::BadResponse(e.to_string()))
    }

    fn write_instance(&self, file: &InstanceFile) -> Result<(), CloudError> {
        let path = self.instance_path(&file.instance_id);
        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| CloudError::BadResponse(e.to_string()))?;
        atomic_write(&path, &json).map_err(|e| CloudError::CommandFailed(e.to_string()))
    }

    fn update_state(&self, instance_id: &str, state: VmState) -> Result<(), CloudError> {
        let mut file = self
            .read_instance(instance_id)?
            .ok_or_else(|| CloudError::InstanceNotFound(instance_id.to_string()))?;
        file.state = state.as_str().to_string();
        file.public_ip = (state == VmState::Running).then(|| "10.0.0.1".to_string());
        self.write_instance(&file)
    }
}

#[async_trait]
impl CloudAdapter for FileFakeCloudAdapter {
    async fn ensure_security_group(&self) -> Result<String, CloudError> {
        Ok("sg-fake".to_string())
    }

    async fn ensure_bucket(&self) -> Result<(), CloudError> {
        Ok(())
    }

    async fn create_vm(&self, req: &CreateVm) -> Result<VmInfo, CloudError> {
        let instance_id = format!("i-fake{}", &req.project_hash[..req.project_hash.len().min(8)]);
        let file = InstanceFile {
            instance_id: instance_id.clone(),
            project_hash: req.project_hash.clone(),
            state: VmState::Running.as_str().to_string(),
            public_ip: Some("10.0.0.1".to_string()),
            region: self.region.clone(),
            az: Some(format!("{}a", self.region)),
            instance_type: req.instance_type.clone(),
        };
        self.write_instance(&file)?;
        file.info()
            .ok_or_else(|| CloudError::BadResponse("bad fake state".to_string()))
    }

    async fn find_vm(&self, project_hash: &str) -> Result<Option<VmInfo>, CloudError> {
        let entries = match std::fs::read_dir(self.instances_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CloudError::CommandFailed(e.to_string())),
        };
        for entry in entries.flatten() {
            let content = match std::fs::read(entry.path()) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let Ok(file) = serde_json::from_slice::<InstanceFile>(&content) else {
                continue;
            };
            if file.project_hash != project_hash {
                continue;
            }
            if let Some(info) = file.info() {
                if !info.state.is_gone() {
                    return Ok(Some(info));
                }
            }
        }
        Ok(None)
    }

    async fn start_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.update_state(instance_id, VmState::Running)
    }

    async fn stop_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.update_state(instance_id, VmState::Stopped)
    }

    async fn terminate_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.update_state(instance_id, VmState::Terminated)
    }

    async fn wait_until_running(
        &self,
        instance_id: &str,
        progress: Progress,
    ) -> Result<(), CloudError> {
        self.update_state(instance_id, VmState::Running)?;
        progress(1);
        Ok(())
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn bucket_name(&self) -> Result<String, CloudError> {
        Ok("yeager-fake".to_string())
    }

    async fn account_id(&self) -> Result<String, CloudError> {
        Ok("000000000000".to_string())
    }

    async fn push_ephemeral_key(
        &self,
        _instance_id: &str,
        _az: &str,
        _os_user: &str,
        _public_key: &str,
    ) -> Result<(), CloudError> {
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        _content_type: &str,
    ) -> Result<(), CloudError> {
        let path = self.object_path(key);
        atomic_write(&path, body).map_err(|e| CloudError::CommandFailed(e.to_string()))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CloudError> {
        match std::fs::read(self.object_path(key)) {
            Ok(c) => Ok(c),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CloudError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(CloudError::CommandFailed(e.to_string())),
        }
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
#[path = "file_fake_tests.rs"]
mod tests;
