// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single user-facing output writer.
//!
//! Three modes: human text (messages on stderr, command output on
//! stdout), JSON (one object per line on stdout), and quiet (errors
//! only). The remote command's own output always flows through untouched
//! in text/quiet modes.

use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
    Quiet,
}

/// User-facing writer shared by the CLI and the engine (via `Reporter`).
#[derive(Debug, Clone, Copy)]
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    pub fn info(&self, message: &str) {
        match self.mode {
            OutputMode::Text => eprintln!("{}", message),
            OutputMode::Json => self.json_line("info", message, None),
            OutputMode::Quiet => {}
        }
    }

    pub fn warn(&self, message: &str) {
        match self.mode {
            OutputMode::Text => eprintln!("warning: {}", message),
            OutputMode::Json => self.json_line("warning", message, None),
            OutputMode::Quiet => {}
        }
    }

    pub fn error(&self, message: &str, fix: Option<&str>) {
        match self.mode {
            OutputMode::Text | OutputMode::Quiet => {
                eprintln!("error: {}", message);
                if let Some(fix) = fix {
                    eprintln!("  fix: {}", fix);
                }
            }
            OutputMode::Json => self.json_line("error", message, fix),
        }
    }

    /// Raw remote output: bytes straight to stdout in text/quiet modes,
    /// wrapped as an object in JSON mode.
    pub fn stream(&self, chunk: &[u8]) {
        match self.mode {
            OutputMode::Text | OutputMode::Quiet => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(chunk);
                let _ = stdout.flush();
            }
            OutputMode::Json => {
                self.json_line("output", &String::from_utf8_lossy(chunk), None);
            }
        }
    }

    /// A machine-readable result payload (status, listings). In text mode
    /// the caller renders its own human form instead.
    pub fn json_result(&self, value: &serde_json::Value) {
        if self.mode == OutputMode::Json {
            println!("{}", value);
        }
    }

    /// A plain stdout line for text-mode rendering (tables, status rows).
    pub fn text_line(&self, line: &str) {
        if self.mode != OutputMode::Json {
            println!("{}", line);
        }
    }

    fn json_line(&self, kind: &str, message: &str, fix: Option<&str>) {
        let mut obj = serde_json::json!({
            "type": kind,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(fix) = fix {
            obj["fix"] = fix.into();
        }
        println!("{}", obj);
    }
}

impl yg_engine::Reporter for Output {
    fn info(&self, message: &str) {
        Output::info(self, message);
    }

    fn warn(&self, message: &str) {
        Output::warn(self, message);
    }

    fn error(&self, message: &str, fix: Option<&str>) {
        Output::error(self, message, fix);
    }

    fn stream(&self, chunk: &[u8]) {
        Output::stream(self, chunk);
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
