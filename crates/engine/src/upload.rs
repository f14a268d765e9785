// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run output and artifact uploads.
//!
//! Everything here is best-effort from the pipeline's point of view: a
//! failed upload is a warning, never a failed run.

use crate::report::Reporter;
use crate::runtime::{RemoteRuntime, RunResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use yg_adapters::{CloudAdapter, CloudError, Transport};
use yg_core::RunId;

/// `meta.json` payload stored next to the run outputs.
#[derive(Debug, Serialize)]
pub struct RunMeta<'a> {
    pub run_id: &'a RunId,
    pub command: &'a str,
    pub project: &'a str,
    pub exit_code: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Object key under the run prefix.
pub fn run_key(project_display_name: &str, run_id: &RunId, name: &str) -> String {
    format!("{}/{}/{}", project_display_name, run_id, name)
}

/// Upload stdout/stderr/exit-code/meta for a completed run. Zero-byte
/// outputs still produce their objects.
pub async fn upload_outputs<C: CloudAdapter>(
    cloud: &C,
    project_display_name: &str,
    run_id: &RunId,
    command: &str,
    stdout: &[u8],
    stderr: &[u8],
    result: &RunResult,
) -> Result<(), CloudError> {
    let key = |name: &str| run_key(project_display_name, run_id, name);

    cloud.put_object(&key("stdout.log"), stdout, "text/plain").await?;
    cloud.put_object(&key("stderr.log"), stderr, "text/plain").await?;
    cloud
        .put_object(
            &key("exit_code"),
            result.exit_code.to_string().as_bytes(),
            "text/plain",
        )
        .await?;

    let duration_ms = (result.end - result.start).num_milliseconds().max(0) as u64;
    let meta = RunMeta {
        run_id,
        command,
        project: project_display_name,
        exit_code: result.exit_code,
        start_time: result.start,
        end_time: result.end,
        duration_ms,
    };
    let body = serde_json::to_vec_pretty(&meta)
        .map_err(|e| CloudError::BadResponse(e.to_string()))?;
    cloud
        .put_object(&key("meta.json"), &body, "application/json")
        .await?;
    Ok(())
}

/// Fetch each configured artifact from the VM and upload it under
/// `artifacts/`. Per-file best effort; invalid or unreadable paths warn
/// through the reporter and are skipped.
pub async fn upload_artifacts<C: CloudAdapter, T: Transport>(
    cloud: &C,
    runtime: &RemoteRuntime<T>,
    project_display_name: &str,
    run_id: &RunId,
    artifacts: &[String],
    reporter: &dyn Reporter,
) {
    for path in artifacts {
        let clean = match validate_artifact_path(path) {
            Ok(clean) => clean,
            Err(reason) => {
                reporter.warn(&format!("artifact {:?} skipped: {}", path, reason));
                continue;
            }
        };

        let remote = format!("{}/{}", runtime.remote_dir(), clean);
        let bytes = match runtime.read_remote_file(&remote).await {
            Ok(bytes) => bytes,
            Err(e) => {
                reporter.warn(&format!("artifact {:?} skipped: {}", path, e));
                continue;
            }
        };

        let key = run_key(
            project_display_name,
            run_id,
            &format!("artifacts/{}", clean),
        );
        if let Err(e) = cloud
            .put_object(&key, &bytes, "application/octet-stream")
            .await
        {
            warn!(key, error = %e, "artifact upload failed");
            reporter.warn(&format!("artifact {:?} upload failed: {}", path, e));
        }
    }
}

/// Normalize an artifact path for use under the `artifacts/` prefix.
///
/// Cleans `.` and empty segments, strips any leading `/`, and resolves
/// `..` pairs; a path that would climb out of the artifacts directory is
/// rejected.
pub fn validate_artifact_path(path: &str) -> Result<String, String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err("escapes artifacts directory".to_string());
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err("empty artifact path".to_string());
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
