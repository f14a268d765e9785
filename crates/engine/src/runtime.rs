// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote command runtime.
//!
//! Commands run on the VM inside detached tmux sessions, so the client can
//! disconnect (or crash) without killing the command, and the exit code is
//! recoverable after any reconnection. Each run `R` leaves four names on
//! the VM: session `yg-R`, marker `/tmp/yg-run-R` (two lines: command,
//! RFC3339 start time), log `/tmp/yg-log-R`, exit file `/tmp/yg-exit-R`.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use yg_adapters::{Transport, TransportError};
use yg_core::{sh_quote, RunId};

/// Prefix of every session the runtime owns.
const SESSION_PREFIX: &str = "yg-";

/// Block separator emitted by the listing script.
const LIST_HEADER: &str = "===TMUX:";

/// Errors from remote runtime operations
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to launch remote session: {0}")]
    LaunchFailed(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("remote file unavailable: {0}")]
    RemoteFileUnavailable(String),
}

/// One command to run remotely.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub command: String,
    pub run_id: RunId,
}

/// Outcome of a completed (not detached) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A live session discovered on the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRun {
    pub run_id: RunId,
    /// From the marker file; absent when the marker is gone or unreadable.
    pub command: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

/// Remote runtime over one VM transport.
#[derive(Debug, Clone)]
pub struct RemoteRuntime<T: Transport> {
    transport: T,
    remote_dir: String,
}

impl<T: Transport> RemoteRuntime<T> {
    pub fn new(transport: T, remote_dir: impl Into<String>) -> Self {
        Self {
            transport,
            remote_dir: remote_dir.into(),
        }
    }

    /// Launch the command in a detached session, stream its merged output
    /// into `output_tx` until it finishes, then recover the exit code.
    ///
    /// Dropping the receiving end of `output_tx` detaches the stream; the
    /// remote session keeps running either way.
    pub async fn run(
        &self,
        req: &RunRequest,
        output_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<RunResult, RuntimeError> {
        let start = Utc::now();

        let launch = launch_command(&self.remote_dir, &req.command, &req.run_id, start);
        let output = self.transport.exec(&launch).await?;
        if !output.success() {
            return Err(RuntimeError::LaunchFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        debug!(run_id = %req.run_id, "remote session launched");

        let stream_result = self
            .transport
            .exec_streamed(&stream_command(&req.run_id), output_tx)
            .await;

        let exit_code = self.read_exit_code(&req.run_id, stream_result).await?;
        Ok(RunResult {
            exit_code,
            start,
            end: Utc::now(),
        })
    }

    /// Read the exit file written by the session wrapper.
    ///
    /// A missing or unreadable exit file propagates the streamer's error if
    /// it had one (the stream broke before completion); otherwise it is
    /// logged and treated as success, since the session ended without one.
    async fn read_exit_code(
        &self,
        run_id: &RunId,
        stream_result: Result<i32, TransportError>,
    ) -> Result<i32, RuntimeError> {
        let read = self
            .transport
            .exec(&format!("cat {} 2>/dev/null", exit_path(run_id)))
            .await;

        if let Ok(output) = read {
            if output.success() {
                if let Ok(code) = output.stdout_text().trim().parse::<i32>() {
                    return Ok(code);
                }
            }
        }

        match stream_result {
            Err(e) => Err(e.into()),
            Ok(_) => {
                warn!(run_id = %run_id, "exit file missing, assuming success");
                Ok(0)
            }
        }
    }

    /// List every live `yg-` session, with marker contents where present.
    pub async fn list_runs(&self) -> Result<Vec<ActiveRun>, RuntimeError> {
        let output = self.transport.exec(LIST_COMMAND).await?;
        Ok(parse_run_listing(&output.stdout_text()))
    }

    pub async fn is_run_active(&self, run_id: &RunId) -> Result<bool, RuntimeError> {
        let output = self
            .transport
            .exec(&format!(
                "tmux has-session -t {} 2>/dev/null",
                session_name(run_id)
            ))
            .await?;
        Ok(output.success())
    }

    /// Kill the session. Best effort: a session that already ended is fine.
    pub async fn kill(&self, run_id: &RunId) -> Result<(), RuntimeError> {
        let output = self
            .transport
            .exec(&format!(
                "tmux kill-session -t {} 2>/dev/null",
                session_name(run_id)
            ))
            .await?;
        if !output.success() {
            debug!(run_id = %run_id, "kill-session reported no session");
        }
        Ok(())
    }

    /// Replay the run's log from the top, then follow it until the session
    /// ends. Chunks go to `output_tx` as they arrive.
    pub async fn tail_log(
        &self,
        run_id: &RunId,
        output_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), RuntimeError> {
        self.transport
            .exec_streamed(&tail_command(run_id), output_tx)
            .await?;
        Ok(())
    }

    /// Read a file from the VM. Stderr is discarded remotely so error text
    /// can never contaminate binary content.
    pub async fn read_remote_file(&self, path: &str) -> Result<Vec<u8>, RuntimeError> {
        let output = self
            .transport
            .exec(&format!("cat {} 2>/dev/null", sh_quote(path)))
            .await?;
        if !output.success() {
            return Err(RuntimeError::RemoteFileUnavailable(path.to_string()));
        }
        Ok(output.stdout)
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }
}

pub fn session_name(run_id: &RunId) -> String {
    format!("{}{}", SESSION_PREFIX, run_id)
}

fn marker_path(run_id: &RunId) -> String {
    format!("/tmp/yg-run-{}", run_id)
}

fn log_path(run_id: &RunId) -> String {
    format!("/tmp/yg-log-{}", run_id)
}

fn exit_path(run_id: &RunId) -> String {
    format!("/tmp/yg-exit-{}", run_id)
}

/// Build the launch command: a detached tmux session whose window runs a
/// bash wrapper. The wrapper cds into the project, writes the two-line
/// marker, pipes the user command through `tee` into the log, captures the
/// command's own status via `PIPESTATUS[0]` (not tee's), and removes the
/// marker on the way out.
///
/// The user command is quoted once for its `bash -c`, and the whole
/// wrapper is quoted again for the outer tmux argument, so command text
/// crosses both shell layers intact.
fn launch_command(
    remote_dir: &str,
    command: &str,
    run_id: &RunId,
    start: DateTime<Utc>,
) -> String {
    let start_text = start.to_rfc3339_opts(SecondsFormat::Secs, true);
    let wrapper = format!(
        "cd {dir} && printf '%s\\n' {cmd} {start} > {marker}; \
         bash -c {cmd} 2>&1 | tee {log}; \
         echo ${{PIPESTATUS[0]}} > {exit}; \
         rm -f {marker}",
        dir = sh_quote(remote_dir),
        cmd = sh_quote(command),
        start = sh_quote(&start_text),
        marker = marker_path(run_id),
        log = log_path(run_id),
        exit = exit_path(run_id),
    );
    format!(
        "tmux new-session -d -s {session} {script}",
        session = session_name(run_id),
        script = sh_quote(&format!("bash -c {}", sh_quote(&wrapper))),
    )
}

/// Build the streamer command: wait for the log to appear (100ms polls, up
/// to ~5s), follow it from the first line, poll the session once a second,
/// and after the session ends give the tail 500ms to flush before killing
/// it. `--pid=$$` bounds the tail by the streamer shell itself.
fn stream_command(run_id: &RunId) -> String {
    format!(
        "n=0; while [ ! -f {log} ] && [ $n -lt 50 ]; do sleep 0.1; n=$((n+1)); done; \
         tail -n +1 -f --pid=$$ {log} & t=$!; \
         while tmux has-session -t {session} 2>/dev/null; do sleep 1; done; \
         sleep 0.5; kill $t 2>/dev/null; wait $t 2>/dev/null; true",
        log = log_path(run_id),
        session = session_name(run_id),
    )
}

/// Replay-then-follow command for `yg logs` against a live session.
fn tail_command(run_id: &RunId) -> String {
    format!(
        "cat {log} 2>/dev/null; \
         if tmux has-session -t {session} 2>/dev/null; then \
         tail -n 0 -f --pid=$$ {log} & t=$!; \
         while tmux has-session -t {session} 2>/dev/null; do sleep 1; done; \
         sleep 0.5; kill $t 2>/dev/null; wait $t 2>/dev/null; fi; true",
        log = log_path(run_id),
        session = session_name(run_id),
    )
}

/// One command listing every `yg-` session followed by its marker, in
/// blocks headed by `===TMUX:<run_id>`.
const LIST_COMMAND: &str = "tmux list-sessions -F '#{session_name}' 2>/dev/null \
    | grep '^yg-' \
    | while read -r s; do id=\"${s#yg-}\"; echo \"===TMUX:$id\"; cat \"/tmp/yg-run-$id\" 2>/dev/null; done; true";

/// Parse the block output of [`LIST_COMMAND`]. Blocks with an invalid run
/// id are skipped entirely; marker lines that fail to parse are ignored.
pub fn parse_run_listing(text: &str) -> Vec<ActiveRun> {
    let mut runs: Vec<ActiveRun> = Vec::new();
    let mut current: Option<(ActiveRun, u8)> = None;

    for line in text.lines() {
        if let Some(id_text) = line.strip_prefix(LIST_HEADER) {
            if let Some((run, _)) = current.take() {
                runs.push(run);
            }
            match RunId::parse(id_text.trim()) {
                Ok(run_id) => {
                    current = Some((
                        ActiveRun {
                            run_id,
                            command: None,
                            start_time: None,
                        },
                        0,
                    ));
                }
                Err(_) => {
                    debug!(id = id_text, "skipping session with malformed run id");
                    current = None;
                }
            }
            continue;
        }

        let Some((ref mut run, ref mut seen)) = current else {
            continue;
        };
        match seen {
            0 => {
                run.command = Some(line.to_string());
                *seen = 1;
            }
            1 => {
                run.start_time = DateTime::parse_from_rfc3339(line.trim())
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
                *seen = 2;
            }
            _ => {}
        }
    }

    if let Some((run, _)) = current {
        runs.push(run);
    }
    runs
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
