// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AWS adapter backed by the `aws` CLI.
//!
//! Every operation is one or more `aws ... --output json` invocations with
//! the stdout parsed as JSON. Raw stderr text is preserved in errors so the
//! classifier can recognize provider error codes.

use super::{CloudAdapter, CloudError, CreateVm, Progress, VmInfo, VmState};
use crate::subprocess::run_with_timeout;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

const SECURITY_GROUP_NAME: &str = "yeager";

/// Ingress ports opened on the project security group: SSH and HTTPS.
const INGRESS_PORTS: [u16; 2] = [22, 443];

/// SSM parameter resolving to the current Ubuntu 24.04 arm64 image.
const AMI_PARAMETER: &str =
    "/aws/service/canonical/ubuntu/server/24.04/stable/current/arm64/hvm/ebs-gp3/ami-id";

const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const WAIT_MAX_ATTEMPTS: u32 = 80;

/// Cloud adapter shelling out to the `aws` binary.
#[derive(Clone)]
pub struct AwsCliAdapter {
    region: String,
    // One-shot cache; the account id never changes within an invocation.
    account: Arc<OnceCell<String>>,
}

impl AwsCliAdapter {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: Arc::new(OnceCell::new()),
        }
    }

    async fn aws(&self, args: &[&str], description: &str) -> Result<String, CloudError> {
        let mut cmd = Command::new("aws");
        cmd.args(["--region", &self.region, "--output", "json"]);
        cmd.args(args);
        debug!(?args, "aws invocation");
        let output = run_with_timeout(cmd, crate::env::aws_timeout(), description)
            .await
            .map_err(CloudError::CommandFailed)?;
        if !output.status.success() {
            return Err(CloudError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn aws_json(
        &self,
        args: &[&str],
        description: &str,
    ) -> Result<serde_json::Value, CloudError> {
        let stdout = self.aws(args, description).await?;
        if stdout.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|e| {
            CloudError::BadResponse(format!("{}: invalid JSON from aws: {}", description, e))
        })
    }

    async fn describe_one(&self, instance_id: &str) -> Result<VmInfo, CloudError> {
        let v = self
            .aws_json(
                &["ec2", "describe-instances", "--instance-ids", instance_id],
                "describe instance",
            )
            .await?;
        first_instance(&v)
            .and_then(|i| parse_instance(i, &self.region))
            .ok_or_else(|| CloudError::InstanceNotFound(instance_id.to_string()))
    }
}

#[async_trait]
impl CloudAdapter for AwsCliAdapter {
    async fn ensure_security_group(&self) -> Result<String, CloudError> {
        let v = self
            .aws_json(
                &[
                    "ec2",
                    "describe-security-groups",
                    "--filters",
                    &format!("Name=group-name,Values={}", SECURITY_GROUP_NAME),
                ],
                "describe security group",
            )
            .await?;

        let existing = v["SecurityGroups"]
            .get(0)
            .and_then(|g| g["GroupId"].as_str())
            .map(String::from);

        let sg_id = match existing {
            Some(id) => id,
            None => {
                let created = self
                    .aws_json(
                        &[
                            "ec2",
                            "create-security-group",
                            "--group-name",
                            SECURITY_GROUP_NAME,
                            "--description",
                            "Yeager project VMs",
                        ],
                        "create security group",
                    )
                    .await?;
                created["GroupId"]
                    .as_str()
                    .ok_or_else(|| {
                        CloudError::BadResponse("create-security-group returned no id".to_string())
                    })?
                    .to_string()
            }
        };

        for port in INGRESS_PORTS {
            let port = port.to_string();
            let result = self
                .aws(
                    &[
                        "ec2",
                        "authorize-security-group-ingress",
                        "--group-id",
                        &sg_id,
                        "--protocol",
                        "tcp",
                        "--port",
                        &port,
                        "--cidr",
                        "0.0.0.0/0",
                    ],
                    "authorize ingress",
                )
                .await;
            match result {
                Ok(_) => {}
                // Rule already present from an earlier run
                Err(CloudError::CommandFailed(e)) if e.contains("InvalidPermission.Duplicate") => {}
                Err(e) => return Err(e),
            }
        }

        Ok(sg_id)
    }

    async fn ensure_bucket(&self) -> Result<(), CloudError> {
        let bucket = self.bucket_name().await?;

        let exists = self
            .aws(&["s3api", "head-bucket", "--bucket", &bucket], "head bucket")
            .await
            .is_ok();

        if !exists {
            let mut args: Vec<&str> = vec!["s3api", "create-bucket", "--bucket", &bucket];
            // us-east-1 rejects an explicit location constraint
            let constraint = format!("LocationConstraint={}", self.region);
            if self.region != "us-east-1" {
                args.push("--create-bucket-configuration");
                args.push(&constraint);
            }
            self.aws(&args, "create bucket").await?;
        }

        let lifecycle = serde_json::json!({
            "Rules": [{
                "ID": "yeager-expire",
                "Status": "Enabled",
                "Filter": { "Prefix": "" },
                "Expiration": { "Days": 30 },
            }]
        })
        .to_string();
        self.aws(
            &[
                "s3api",
                "put-bucket-lifecycle-configuration",
                "--bucket",
                &bucket,
                "--lifecycle-configuration",
                &lifecycle,
            ],
            "put bucket lifecycle",
        )
        .await?;

        Ok(())
    }

    async fn create_vm(&self, req: &CreateVm) -> Result<VmInfo, CloudError> {
        let ami = self
            .aws_json(
                &["ssm", "get-parameter", "--name", AMI_PARAMETER],
                "resolve machine image",
            )
            .await?["Parameter"]["Value"]
            .as_str()
            .ok_or_else(|| CloudError::BadResponse("no AMI id in SSM response".to_string()))?
            .to_string();

        let tag_spec = tag_specifications(req);
        let v = self
            .aws_json(
                &[
                    "ec2",
                    "run-instances",
                    "--image-id",
                    &ami,
                    "--instance-type",
                    &req.instance_type,
                    "--security-group-ids",
                    &req.security_group_id,
                    "--user-data",
                    &req.user_data,
                    "--tag-specifications",
                    &tag_spec,
                ],
                "launch instance",
            )
            .await?;

        v["Instances"]
            .get(0)
            .and_then(|i| parse_instance(i, &self.region))
            .ok_or_else(|| CloudError::BadResponse("run-instances returned no instance".to_string()))
    }

    async fn find_vm(&self, project_hash: &str) -> Result<Option<VmInfo>, CloudError> {
        let tag_filter = format!("Name=tag:yeager:project-hash,Values={}", project_hash);
        let v = self
            .aws_json(
                &[
                    "ec2",
                    "describe-instances",
                    "--filters",
                    &tag_filter,
                    // Exclude terminated / shutting-down server-side
                    "Name=instance-state-name,Values=pending,running,stopping,stopped",
                ],
                "find instance",
            )
            .await?;
        Ok(first_instance(&v).and_then(|i| parse_instance(i, &self.region)))
    }

    async fn start_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.aws(
            &["ec2", "start-instances", "--instance-ids", instance_id],
            "start instance",
        )
        .await
        .map(|_| ())
    }

    async fn stop_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.aws(
            &["ec2", "stop-instances", "--instance-ids", instance_id],
            "stop instance",
        )
        .await
        .map(|_| ())
    }

    async fn terminate_vm(&self, instance_id: &str) -> Result<(), CloudError> {
        self.aws(
            &["ec2", "terminate-instances", "--instance-ids", instance_id],
            "terminate instance",
        )
        .await
        .map(|_| ())
    }

    async fn wait_until_running(
        &self,
        instance_id: &str,
        progress: Progress,
    ) -> Result<(), CloudError> {
        for attempt in 1..=WAIT_MAX_ATTEMPTS {
            let info = self.describe_one(instance_id).await?;
            if info.state == VmState::Running {
                return Ok(());
            }
            progress(attempt);
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
        Err(CloudError::WaitTimeout(instance_id.to_string()))
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn bucket_name(&self) -> Result<String, CloudError> {
        Ok(format!("yeager-{}", self.account_id().await?))
    }

    async fn account_id(&self) -> Result<String, CloudError> {
        self.account
            .get_or_try_init(|| async {
                let v = self
                    .aws_json(&["sts", "get-caller-identity"], "resolve account")
                    .await?;
                v["Account"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| CloudError::BadResponse("no account id".to_string()))
            })
            .await
            .cloned()
    }

    async fn push_ephemeral_key(
        &self,
        instance_id: &str,
        az: &str,
        os_user: &str,
        public_key: &str,
    ) -> Result<(), CloudError> {
        self.aws(
            &[
                "ec2-instance-connect",
                "send-ssh-public-key",
                "--instance-id",
                instance_id,
                "--availability-zone",
                az,
                "--instance-os-user",
                os_user,
                "--ssh-public-key",
                public_key,
            ],
            "push ephemeral key",
        )
        .await
        .map(|_| ())
    }

    async fn put_object(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(), CloudError> {
        let bucket = self.bucket_name().await?;
        let mut file = tempfile::NamedTempFile::new()
            .map_err(|e| CloudError::CommandFailed(format!("temp file: {}", e)))?;
        file.write_all(body)
            .map_err(|e| CloudError::CommandFailed(format!("temp file: {}", e)))?;
        let path = file.path().to_string_lossy().into_owned();

        self.aws(
            &[
                "s3api",
                "put-object",
                "--bucket",
                &bucket,
                "--key",
                key,
                "--body",
                &path,
                "--content-type",
                content_type,
            ],
            "upload object",
        )
        .await
        .map(|_| ())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CloudError> {
        let bucket = self.bucket_name().await?;
        let file = tempfile::NamedTempFile::new()
            .map_err(|e| CloudError::CommandFailed(format!("temp file: {}", e)))?;
        let path = file.path().to_string_lossy().into_owned();

        let result = self
            .aws(
                &["s3api", "get-object", "--bucket", &bucket, "--key", key, &path],
                "download object",
            )
            .await;
        match result {
            Ok(_) => std::fs::read(file.path())
                .map_err(|e| CloudError::CommandFailed(format!("read download: {}", e))),
            Err(CloudError::CommandFailed(e)) if e.contains("NoSuchKey") || e.contains("404") => {
                Err(CloudError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// First instance of the first reservation in a describe-instances response.
fn first_instance(v: &serde_json::Value) -> Option<&serde_json::Value> {
    v["Reservations"].get(0)?.get("Instances")?.get(0)
}

fn parse_instance(v: &serde_json::Value, region: &str) -> Option<VmInfo> {
    Some(VmInfo {
        instance_id: v["InstanceId"].as_str()?.to_string(),
        state: VmState::parse(v["State"]["Name"].as_str()?)?,
        public_ip: v["PublicIpAddress"].as_str().map(String::from),
        region: region.to_string(),
        az: v["Placement"]["AvailabilityZone"].as_str().map(String::from),
        instance_type: v["InstanceType"].as_str()?.to_string(),
    })
}

/// JSON tag specification for run-instances. JSON form rather than the
/// shorthand syntax: project paths may contain commas or spaces.
fn tag_specifications(req: &CreateVm) -> String {
    serde_json::json!([{
        "ResourceType": "instance",
        "Tags": [
            { "Key": "yeager:project-hash", "Value": req.project_hash },
            { "Key": "yeager:project-path", "Value": req.project_path.to_string_lossy() },
            { "Key": "yeager:created", "Value": chrono::Utc::now().to_rfc3339() },
            { "Key": "Name", "Value": format!("yeager-{}", req.project_hash) },
        ]
    }])
    .to_string()
}

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;
