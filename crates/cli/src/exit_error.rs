// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed process exit codes carried through `anyhow`.

/// An error that is really just an exit code. `silent` marks errors whose
/// message was already rendered (classified cloud failures); the top-level
/// handler must not print them again.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub silent: bool,
}

impl ExitError {
    pub fn code(code: i32) -> Self {
        Self {
            code,
            silent: false,
        }
    }

    pub fn silent(code: i32) -> Self {
        Self { code, silent: true }
    }
}

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exit code {}", self.code)
    }
}

impl std::error::Error for ExitError {}
