// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The root command: run an arbitrary command on the project VM.

use crate::context::Context;
use crate::exit_error::ExitError;
use anyhow::Result;
use tracing::warn;
use yg_adapters::{SshTransport, VmInfo};
use yg_engine::{EphemeralKey, Pipeline, RsyncSync};

pub async fn handle(ctx: &Context, args: &[String]) -> Result<i32> {
    if args.is_empty() {
        anyhow::bail!("no command given");
    }
    let command = command_line(args);

    // One throwaway keypair per invocation; without ssh-keygen we fall
    // back to whatever keys the user's agent holds.
    let key = match EphemeralKey::generate().await {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "ephemeral key generation failed, using default keys");
            None
        }
    };
    let identity = key.as_ref().map(|k| k.private_key_path());

    let os_user = ctx.config.os_user.clone();
    let connect = {
        let identity = identity.clone();
        let os_user = os_user.clone();
        move |vm: &VmInfo| {
            let host = vm.public_ip.clone().unwrap_or_default();
            let mut transport = SshTransport::new(host, &os_user);
            if let Some(ref identity) = identity {
                transport = transport.with_identity(identity);
            }
            transport
        }
    };
    let sync = match identity {
        Some(ref identity) => RsyncSync::new().with_identity(identity),
        None => RsyncSync::new(),
    };

    let mut pipeline = Pipeline::new(
        ctx.cloud.clone(),
        connect,
        sync,
        ctx.store.clone(),
        ctx.project.clone(),
        ctx.config.clone(),
        ctx.reporter(),
    );
    if let Some(ref key) = key {
        pipeline = pipeline.with_public_key(key.public_key());
    }

    match pipeline.run(&command, &ctx.cancel).await {
        Ok(outcome) => Ok(outcome.exit_code),
        Err(e) if e.is_displayed() => Err(ExitError::silent(1).into()),
        Err(e) => Err(e.into()),
    }
}

/// Join argv back into one shell command line, ssh-style: words are
/// joined with spaces and the remote shell re-parses the result. Complex
/// commands are passed as a single quoted argument
/// (`yg 'cargo test -- --nocapture'`), same as with ssh.
pub fn command_line(args: &[String]) -> String {
    args.join(" ")
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
