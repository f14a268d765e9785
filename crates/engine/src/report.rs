// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing message sink.
//!
//! The engine never prints; everything a user should see goes through one
//! [`Reporter`] owned by the CLI, which renders text, JSON lines, or
//! nothing depending on the output mode.

/// Sink for user-facing messages. Object-safe so engine components can
/// share one `&dyn Reporter`.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    /// An error explanation, optionally with a suggested fix.
    fn error(&self, message: &str, fix: Option<&str>);
    /// Raw remote command output, passed through untouched.
    fn stream(&self, _chunk: &[u8]) {}
}

/// Discards everything (daemon and tests that don't assert output).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str, _fix: Option<&str>) {}
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingReporter;

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use super::Reporter;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Captures messages for assertions.
    #[derive(Clone, Default)]
    pub struct RecordingReporter {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        /// All recorded lines, prefixed with their level.
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().clone()
        }

        /// True when some recorded line contains `needle`.
        pub fn contains(&self, needle: &str) -> bool {
            self.lines.lock().iter().any(|l| l.contains(needle))
        }
    }

    impl Reporter for RecordingReporter {
        fn info(&self, message: &str) {
            self.lines.lock().push(format!("info: {}", message));
        }

        fn warn(&self, message: &str) {
            self.lines.lock().push(format!("warn: {}", message));
        }

        fn error(&self, message: &str, fix: Option<&str>) {
            let mut lines = self.lines.lock();
            match fix {
                Some(fix) => lines.push(format!("error: {} (fix: {})", message, fix)),
                None => lines.push(format!("error: {}", message)),
            }
        }

        fn stream(&self, chunk: &[u8]) {
            self.lines
                .lock()
                .push(format!("stream: {}", String::from_utf8_lossy(chunk)));
        }
    }
}
