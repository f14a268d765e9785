// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg destroy` - terminate the VM and delete its record.

use crate::context::Context;
use anyhow::Result;
use yg_engine::{stop_monitor, Orchestrator};

pub async fn handle(ctx: &Context, force: bool) -> Result<i32> {
    if !force {
        ctx.output.warn(
            "this terminates the project VM and deletes its local record; \
             re-run with --force to proceed",
        );
        return Ok(1);
    }

    if let Err(e) = stop_monitor(&ctx.store) {
        tracing::warn!(error = %e, "failed to stop idle supervisor");
    }

    let orchestrator = Orchestrator::new(ctx.cloud.clone(), ctx.store.clone(), ctx.reporter());
    match orchestrator.destroy(&ctx.project).await {
        Ok(Some(instance_id)) => {
            ctx.output.info(&format!("terminated {}", instance_id));
        }
        Ok(None) => {
            ctx.output.info("no instance found; local record cleared");
        }
        Err(e) => return Err(ctx.cloud_fail(e.to_string())),
    }
    Ok(0)
}
