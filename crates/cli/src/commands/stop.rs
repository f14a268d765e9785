// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg stop` - stop the project VM.

use crate::context::Context;
use anyhow::Result;
use yg_adapters::{CloudAdapter, VmState};
use yg_engine::stop_monitor;

pub async fn handle(ctx: &Context) -> Result<i32> {
    // An explicit stop supersedes any pending idle stop.
    if let Err(e) = stop_monitor(&ctx.store) {
        tracing::warn!(error = %e, "failed to stop idle supervisor");
    }

    let Some(vm) = ctx.find_vm().await? else {
        ctx.output.info("no VM to stop");
        return Ok(0);
    };

    match vm.state {
        VmState::Running | VmState::Pending => {
            ctx.cloud
                .stop_vm(&vm.instance_id)
                .await
                .map_err(|e| ctx.cloud_fail(e.to_string()))?;
            ctx.output
                .info(&format!("stopping {}", vm.instance_id));
        }
        state => {
            ctx.output
                .info(&format!("VM is already {}", state));
        }
    }
    Ok(0)
}
