// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote transport adapters.
//!
//! One [`Transport`] per VM connection. The runtime opens multiple
//! independent sessions per run (launch, stream, exit-code read); each
//! `exec*` call is one session.

mod ssh;

pub use ssh::SshTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, TransportCall};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("remote execution failed: {0}")]
    ExecFailed(String),
    #[error("stream interrupted: {0}")]
    StreamFailed(String),
}

/// Captured output of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// A command channel to the VM.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Run a command remotely, capturing stdout and stderr.
    ///
    /// A non-zero remote exit code is NOT an error here; it is reported in
    /// [`ExecOutput::exit_code`]. Errors mean the session itself failed.
    async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError>;

    /// Run a command remotely, forwarding merged output chunks to `tx` as
    /// they arrive. Returns the remote exit code.
    async fn exec_streamed(
        &self,
        command: &str,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<i32, TransportError>;

    /// Readiness probe: connect and immediately close. No command runs.
    async fn probe(&self, timeout: Duration) -> Result<(), TransportError>;
}
