// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg up` - ensure the VM is running, optionally babysitting it.

use crate::context::Context;
use crate::exit_error::ExitError;
use anyhow::Result;
use std::time::Duration;
use yg_adapters::{SshTransport, VmInfo};
use yg_core::SystemClock;
use yg_engine::{EphemeralKey, IdleWatcher, Pipeline, RsyncSync, WatchOutcome};

/// Poll cadence of the in-process idle watcher.
const WATCH_INTERVAL: Duration = Duration::from_secs(30);

pub async fn handle(ctx: &Context, keep_alive: bool) -> Result<i32> {
    let key = EphemeralKey::generate().await?;
    let identity = key.private_key_path();

    let os_user = ctx.config.os_user.clone();
    let connect = {
        let identity = identity.clone();
        let os_user = os_user.clone();
        move |vm: &VmInfo| {
            SshTransport::new(vm.public_ip.clone().unwrap_or_default(), &os_user)
                .with_identity(&identity)
        }
    };

    let pipeline = Pipeline::new(
        ctx.cloud.clone(),
        connect,
        RsyncSync::new().with_identity(&identity),
        ctx.store.clone(),
        ctx.project.clone(),
        ctx.config.clone(),
        ctx.reporter(),
    )
    .with_public_key(key.public_key());

    let ensured = match pipeline.ensure_up(&ctx.cancel).await {
        Ok(ensured) => ensured,
        Err(e) if e.is_displayed() => return Err(ExitError::silent(1).into()),
        Err(e) => return Err(e.into()),
    };
    ctx.output.info(&format!(
        "VM {} is running ({})",
        ensured.info.instance_id,
        ensured.info.public_ip.as_deref().unwrap_or("no ip"),
    ));

    if !keep_alive {
        return Ok(0);
    }

    let Some(idle_stop) = ctx.config.idle_stop else {
        anyhow::bail!("--keep-alive needs `idle_stop` set in yeager.toml");
    };

    let (runtime, _key) = ctx.remote_runtime(&ensured.info).await?;
    ctx.output.info(&format!(
        "watching for {}s of inactivity (Ctrl-C to leave the VM running)",
        idle_stop.as_secs()
    ));

    let watcher = IdleWatcher::new(
        ctx.cloud.clone(),
        runtime,
        SystemClock,
        idle_stop,
        WATCH_INTERVAL,
    );
    match watcher.watch(&ensured.info.instance_id, &ctx.cancel).await {
        Ok(WatchOutcome::Stopped) => {
            ctx.output.info("VM stopped after idle period");
            Ok(0)
        }
        Ok(WatchOutcome::Cancelled) => {
            ctx.output.info("watcher cancelled; VM left running");
            Ok(0)
        }
        Err(e) => Err(ctx.cloud_fail(e.to_string())),
    }
}
