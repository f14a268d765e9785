// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! yg - Yeager CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod context;
mod exit_error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{destroy, kill, logs, monitor_daemon, run, status, stop, up};
use exit_error::ExitError;
use output::{Output, OutputMode};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "yg",
    version,
    about = "Yeager - run project commands on a per-project cloud VM",
    after_help = "Run any command by passing it directly: `yg cargo test`, `yg make -j8`.\n\
                  The VM is created on first use and stopped automatically when idle."
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Machine-readable output (one JSON object per line)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Verbose diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the project VM, active sessions, and recent runs
    Status,
    /// Stream a run's output (live session or stored log)
    Logs {
        /// Run id (defaults to the most recent run)
        run_id: Option<String>,
        /// Keep only the last N lines
        #[arg(long, value_name = "N")]
        tail: Option<usize>,
    },
    /// Kill a running session on the VM
    Kill {
        /// Run id (defaults to the most recent run)
        run_id: Option<String>,
    },
    /// Stop the project VM
    Stop,
    /// Terminate the VM and delete its local record
    Destroy {
        /// Actually do it
        #[arg(long)]
        force: bool,
    },
    /// Ensure the VM is up
    Up {
        /// Stay attached and stop the VM after `idle_stop` inactivity
        #[arg(long)]
        keep_alive: bool,
    },
    /// Idle-stop daemon entrypoint (spawned by yg itself)
    #[command(name = "monitor-daemon", hide = true)]
    MonitorDaemon {
        #[arg(long)]
        project_hash: String,
        #[arg(long)]
        state_dir: PathBuf,
        #[arg(long)]
        grace_period: String,
    },
    /// Any other invocation runs as a command on the VM
    #[command(external_subcommand)]
    Run(Vec<String>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Text
    };
    let output = Output::new(mode);

    match dispatch(cli, output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            match e.downcast_ref::<ExitError>() {
                Some(exit) => {
                    // Silent exits were already rendered (classified errors).
                    if !exit.silent {
                        output.error(&e.to_string(), None);
                    }
                    std::process::exit(exit.code);
                }
                None => {
                    output.error(&format_error(&e), None);
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn dispatch(cli: Cli, output: Output) -> Result<i32> {
    // The daemon manages its own logging and signals; everything else
    // shares the context + cancellation setup below.
    let command = match cli.command {
        Some(Commands::MonitorDaemon {
            project_hash,
            state_dir,
            grace_period,
        }) => {
            return monitor_daemon::handle(project_hash, state_dir, &grace_period).await;
        }
        other => other,
    };

    if cli.verbose {
        init_verbose_logging();
    }

    if let Some(ref dir) = cli.directory {
        let canonical = std::fs::canonicalize(dir).map_err(|e| {
            anyhow::anyhow!("cannot change to directory '{}': {}", dir.display(), e)
        })?;
        std::env::set_current_dir(&canonical).map_err(|e| {
            anyhow::anyhow!("cannot change to directory '{}': {}", canonical.display(), e)
        })?;
    }

    let cancel = cancel_on_signals();
    let ctx = context::Context::resolve(output, cancel)?;

    match command {
        None => {
            // Bare `yg` prints help; running nothing is not an error.
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(0)
        }
        Some(Commands::Status) => status::handle(&ctx).await,
        Some(Commands::Logs { run_id, tail }) => {
            logs::handle(&ctx, run_id.as_deref(), tail).await
        }
        Some(Commands::Kill { run_id }) => kill::handle(&ctx, run_id.as_deref()).await,
        Some(Commands::Stop) => stop::handle(&ctx).await,
        Some(Commands::Destroy { force }) => destroy::handle(&ctx, force).await,
        Some(Commands::Up { keep_alive }) => up::handle(&ctx, keep_alive).await,
        Some(Commands::Run(args)) => run::handle(&ctx, &args).await,
        Some(Commands::MonitorDaemon { .. }) => unreachable!(),
    }
}

/// Trip one token on SIGINT or SIGTERM; the pipeline turns this into
/// either "detach" (mid-run) or a cancellation error (anywhere else).
fn cancel_on_signals() -> CancellationToken {
    use tokio::signal::unix::{signal, SignalKind};

    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        trip.cancel();
    });
    cancel
}

fn init_verbose_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains the source error text, the
/// "Caused by" chain is skipped to avoid noisy duplicate output (common
/// when thiserror variants use `#[error("... {0}")]` with `#[from]`).
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
