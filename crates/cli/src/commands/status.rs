// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `yg status` - project VM, active sessions, recent runs.

use crate::context::Context;
use anyhow::Result;
use chrono::Utc;
use yg_adapters::VmState;
use yg_core::{format_elapsed, format_time_ago};
use yg_engine::ActiveRun;
use std::time::Duration;

/// How many history entries the human view shows.
const SHOWN_HISTORY: usize = 5;

pub async fn handle(ctx: &Context) -> Result<i32> {
    let record = match ctx.store.load_vm() {
        Ok(record) => Some(record),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    if record.is_none() {
        ctx.output
            .text_line("no VM provisioned for this project (any `yg <command>` creates one)");
        ctx.output.json_result(&serde_json::json!({
            "type": "status",
            "project": ctx.project.display_name,
            "vm": serde_json::Value::Null,
        }));
        return Ok(0);
    }

    let vm = ctx.find_vm().await?;
    let history = ctx.store.load_history()?;

    // Live sessions are only reachable on a running VM; anything else
    // degrades gracefully to "none".
    let sessions: Vec<ActiveRun> = match vm {
        Some(ref vm) if vm.state == VmState::Running && vm.public_ip.is_some() => {
            match ctx.remote_runtime(vm).await {
                Ok((runtime, _key)) => runtime.list_runs().await.unwrap_or_default(),
                Err(_) => Vec::new(),
            }
        }
        _ => Vec::new(),
    };

    ctx.output.json_result(&serde_json::json!({
        "type": "status",
        "project": ctx.project.display_name,
        "vm": vm.as_ref().map(|vm| serde_json::json!({
            "instance_id": vm.instance_id,
            "state": vm.state.as_str(),
            "public_ip": vm.public_ip,
            "instance_type": vm.instance_type,
            "region": vm.region,
        })),
        "sessions": sessions.iter().map(|run| serde_json::json!({
            "run_id": run.run_id.as_str(),
            "command": run.command,
            "start_time": run.start_time.map(|t| t.to_rfc3339()),
        })).collect::<Vec<_>>(),
        "history": history.iter().take(SHOWN_HISTORY).map(|entry| serde_json::json!({
            "run_id": entry.run_id.as_str(),
            "command": entry.command,
            "exit_code": entry.exit_code,
            "start_time": entry.start_time.to_rfc3339(),
            "duration_ms": entry.duration_ms,
        })).collect::<Vec<_>>(),
    }));

    // Human rendering.
    ctx.output
        .text_line(&format!("project: {}", ctx.project.display_name));
    match vm {
        Some(ref vm) => {
            ctx.output.text_line(&format!(
                "vm: {} ({}, {}, {})",
                vm.instance_id,
                vm.state,
                vm.instance_type,
                vm.public_ip.as_deref().unwrap_or("no ip"),
            ));
        }
        None => ctx
            .output
            .text_line("vm: record exists but the instance is gone (next run recreates it)"),
    }

    if sessions.is_empty() {
        ctx.output.text_line("sessions: none");
    } else {
        ctx.output.text_line("sessions:");
        for run in &sessions {
            let since = run
                .start_time
                .map(|t| format_time_ago(t, Utc::now()))
                .unwrap_or_else(|| "-".to_string());
            ctx.output.text_line(&format!(
                "  {}  {}  {}",
                run.run_id,
                since,
                run.command.as_deref().unwrap_or("?"),
            ));
        }
    }

    if history.is_empty() {
        ctx.output.text_line("history: none");
    } else {
        ctx.output.text_line("history:");
        for entry in history.iter().take(SHOWN_HISTORY) {
            ctx.output.text_line(&format!(
                "  {}  exit {:>3}  {}  {:>8}  {}",
                entry.run_id,
                entry.exit_code,
                format_time_ago(entry.start_time, Utc::now()),
                format_elapsed(Duration::from_millis(entry.duration_ms)),
                entry.command,
            ));
        }
    }

    Ok(0)
}
