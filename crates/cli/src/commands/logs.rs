// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg logs` - stream a live session or replay the stored log.

use crate::context::Context;
use anyhow::Result;
use tokio::sync::mpsc;
use yg_adapters::{CloudAdapter, CloudError, VmState};
use yg_engine::run_key;

pub async fn handle(ctx: &Context, run_id: Option<&str>, tail: Option<usize>) -> Result<i32> {
    let run_id = ctx.resolve_run_id(run_id)?;

    // A live session streams; everything else falls back to the stored
    // stdout object.
    if let Some(vm) = ctx.find_vm().await? {
        if vm.state == VmState::Running && vm.public_ip.is_some() {
            if let Ok((runtime, _key)) = ctx.remote_runtime(&vm).await {
                if runtime.is_run_active(&run_id).await.unwrap_or(false) {
                    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
                    let stream = {
                        let runtime = runtime.clone();
                        let run_id = run_id.clone();
                        tokio::spawn(async move { runtime.tail_log(&run_id, tx).await })
                    };

                    loop {
                        tokio::select! {
                            _ = ctx.cancel.cancelled() => {
                                stream.abort();
                                break;
                            }
                            chunk = rx.recv() => match chunk {
                                Some(chunk) => ctx.output.stream(&chunk),
                                None => break,
                            }
                        }
                    }
                    return Ok(0);
                }
            }
        }
    }

    let key = run_key(&ctx.project.display_name, &run_id, "stdout.log");
    let bytes = match ctx.cloud.get_object(&key).await {
        Ok(bytes) => bytes,
        Err(CloudError::ObjectNotFound(_)) => {
            anyhow::bail!("no live session and no stored log for run {}", run_id)
        }
        Err(e) => return Err(ctx.cloud_fail(e.to_string())),
    };

    match tail {
        Some(n) => {
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(n);
            for line in &lines[start..] {
                ctx.output.stream(format!("{}\n", line).as_bytes());
            }
        }
        None => ctx.output.stream(&bytes),
    }
    Ok(0)
}
