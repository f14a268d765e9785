// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg kill` - kill a remote session.

use crate::context::Context;
use anyhow::Result;
use yg_adapters::VmState;

pub async fn handle(ctx: &Context, run_id: Option<&str>) -> Result<i32> {
    let run_id = ctx.resolve_run_id(run_id)?;

    let Some(vm) = ctx.find_vm().await? else {
        ctx.output.info("no VM, nothing to kill");
        return Ok(0);
    };
    if vm.state != VmState::Running {
        ctx.output
            .info(&format!("VM is {}, nothing to kill", vm.state));
        return Ok(0);
    }

    let (runtime, _key) = ctx.remote_runtime(&vm).await?;
    runtime.kill(&run_id).await?;
    ctx.output.info(&format!("killed run {}", run_id));
    Ok(0)
}
