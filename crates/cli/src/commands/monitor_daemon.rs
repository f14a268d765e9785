// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hidden daemon entrypoint (`yg monitor-daemon ...`).
//!
//! Spawned detached by the engine's supervisor Start path; never invoked
//! by users. Stderr is already redirected to `monitor.log` by the parent.

use anyhow::Result;
use std::path::PathBuf;
use yg_daemon::{DaemonArgs, init_logging, run};

pub async fn handle(project_hash: String, state_dir: PathBuf, grace_period: &str) -> Result<i32> {
    init_logging();

    let grace_period = yg_core::parse_duration(grace_period)
        .map_err(|e| anyhow::anyhow!("invalid --grace-period: {}", e))?;

    run(DaemonArgs {
        project_hash,
        state_dir,
        grace_period,
    })
    .await?;
    Ok(0)
}
