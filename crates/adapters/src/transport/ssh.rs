// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH transport adapter

use super::{ExecOutput, Transport, TransportError};
use crate::subprocess::{run_with_timeout, SSH_TIMEOUT};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

/// ssh reserves exit status 255 for its own failures (the remote command's
/// status is anything else).
const SSH_ERROR_STATUS: i32 = 255;

/// Transport shelling out to the `ssh` binary.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    user: String,
    identity: Option<PathBuf>,
    port: u16,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            identity: None,
            port: 22,
        }
    }

    /// Use a specific private key instead of the agent/default keys.
    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn command(&self, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(["-o", "BatchMode=yes"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-o", "LogLevel=ERROR"])
            .args([
                "-o",
                &format!(
                    "ConnectTimeout={}",
                    crate::env::ssh_connect_timeout().as_secs().max(1)
                ),
            ])
            .args(["-p", &self.port.to_string()]);
        if let Some(ref identity) = self.identity {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(format!("{}@{}", self.user, self.host));
        cmd.arg(remote_command);
        cmd
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError> {
        let output = run_with_timeout(self.command(command), SSH_TIMEOUT, "ssh")
            .await
            .map_err(TransportError::ExecFailed)?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == SSH_ERROR_STATUS {
            return Err(TransportError::ExecFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }

    async fn exec_streamed(
        &self,
        command: &str,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<i32, TransportError> {
        let mut cmd = self.command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Cancellation drops this future; the local ssh client must die
            // with it (the remote session survives either way).
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::StreamFailed(e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let out_task = tokio::spawn(forward(stdout, tx.clone()));
        let err_task = tokio::spawn(forward(stderr, tx));

        let status = child
            .wait()
            .await
            .map_err(|e| TransportError::StreamFailed(e.to_string()))?;
        let _ = out_task.await;
        let _ = err_task.await;

        let exit_code = status.code().unwrap_or(-1);
        if exit_code == SSH_ERROR_STATUS {
            return Err(TransportError::StreamFailed(
                "ssh connection ended abnormally".to_string(),
            ));
        }
        Ok(exit_code)
    }

    async fn probe(&self, timeout: Duration) -> Result<(), TransportError> {
        let addr = format!("{}:{}", self.host, self.port);
        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::ConnectFailed(format!("{}: {}", addr, e))),
            Err(_) => Err(TransportError::ConnectFailed(format!(
                "{}: connect timed out",
                addr
            ))),
        }
    }
}

/// Pump a child pipe into the chunk channel until EOF.
async fn forward<R>(reader: Option<R>, tx: mpsc::Sender<Vec<u8>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(mut reader) = reader else { return };
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    // Receiver gone (local cancellation); stop pumping.
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "stream read error");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
