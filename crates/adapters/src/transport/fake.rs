// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ExecOutput, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Exec(String),
    Stream(String),
    Probe,
}

/// Scripted response for commands matching a substring.
#[derive(Debug, Clone)]
enum ExecScript {
    Output(ExecOutput),
    Fail(String),
}

#[derive(Debug, Clone)]
struct StreamScript {
    chunks: Vec<Vec<u8>>,
    exit_code: i32,
    /// Keep the stream open after the chunks until the receiver hangs up
    /// (models a long-running remote command for cancellation tests).
    hold_open: bool,
    fail: Option<String>,
}

impl Default for StreamScript {
    fn default() -> Self {
        Self {
            chunks: Vec::new(),
            exit_code: 0,
            hold_open: false,
            fail: None,
        }
    }
}

struct FakeTransportState {
    exec_scripts: Vec<(String, ExecScript)>,
    stream: StreamScript,
    probe_results: VecDeque<Result<(), String>>,
    calls: Vec<TransportCall>,
}

/// Fake transport with scripted responses
#[derive(Clone)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeTransportState>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTransportState {
                exec_scripts: Vec::new(),
                stream: StreamScript::default(),
                probe_results: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `exec` for commands containing `needle`. First match wins.
    pub fn on_exec(&self, needle: &str, output: ExecOutput) {
        self.inner
            .lock()
            .exec_scripts
            .push((needle.to_string(), ExecScript::Output(output)));
    }

    /// Script `exec` output text (stdout, exit 0) for matching commands.
    pub fn on_exec_stdout(&self, needle: &str, stdout: &str) {
        self.on_exec(
            needle,
            ExecOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                exit_code: 0,
            },
        );
    }

    /// Script `exec` failure for matching commands.
    pub fn on_exec_fail(&self, needle: &str, message: &str) {
        self.inner
            .lock()
            .exec_scripts
            .push((needle.to_string(), ExecScript::Fail(message.to_string())));
    }

    /// Script the streamed session: chunks to deliver, then the exit code.
    pub fn set_stream(&self, chunks: &[&[u8]], exit_code: i32) {
        let mut inner = self.inner.lock();
        inner.stream.chunks = chunks.iter().map(|c| c.to_vec()).collect();
        inner.stream.exit_code = exit_code;
    }

    /// After delivering chunks, keep the stream open until cancelled.
    pub fn hold_stream_open(&self) {
        self.inner.lock().stream.hold_open = true;
    }

    /// Make the streamed session fail after delivering its chunks.
    pub fn fail_stream(&self, message: &str) {
        self.inner.lock().stream.fail = Some(message.to_string());
    }

    /// Script the outcomes of successive probes. Unscripted probes succeed.
    pub fn script_probes(&self, results: &[Result<(), &str>]) {
        let mut inner = self.inner.lock();
        inner.probe_results = results
            .iter()
            .map(|r| r.map_err(|e| e.to_string()))
            .collect();
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Commands passed to `exec`, in order.
    pub fn exec_commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Exec(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn probe_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::Probe))
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn exec(&self, command: &str) -> Result<ExecOutput, TransportError> {
        let script = {
            let mut inner = self.inner.lock();
            inner.calls.push(TransportCall::Exec(command.to_string()));
            inner
                .exec_scripts
                .iter()
                .find(|(needle, _)| command.contains(needle.as_str()))
                .map(|(_, script)| script.clone())
        };
        match script {
            Some(ExecScript::Output(output)) => Ok(output),
            Some(ExecScript::Fail(message)) => Err(TransportError::ExecFailed(message)),
            None => Ok(ExecOutput::default()),
        }
    }

    async fn exec_streamed(
        &self,
        command: &str,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<i32, TransportError> {
        let stream = {
            let mut inner = self.inner.lock();
            inner.calls.push(TransportCall::Stream(command.to_string()));
            inner.stream.clone()
        };

        for chunk in stream.chunks {
            if tx.send(chunk).await.is_err() {
                return Ok(stream.exit_code);
            }
        }

        if let Some(message) = stream.fail {
            return Err(TransportError::StreamFailed(message));
        }

        if stream.hold_open {
            // Stay "running" until the receiver is dropped.
            tx.closed().await;
        }

        Ok(stream.exit_code)
    }

    async fn probe(&self, _timeout: Duration) -> Result<(), TransportError> {
        let result = {
            let mut inner = self.inner.lock();
            inner.calls.push(TransportCall::Probe);
            inner.probe_results.pop_front()
        };
        match result {
            Some(Ok(())) | None => Ok(()),
            Some(Err(message)) => Err(TransportError::ConnectFailed(message)),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
