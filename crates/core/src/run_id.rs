// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifiers.

use rand::Rng;
use thiserror::Error;

/// Exact length of a run id.
pub const RUN_ID_LEN: usize = 8;

/// Rejected run id text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid run id {0:?} (expected {RUN_ID_LEN} lowercase hex characters)")]
pub struct InvalidRunId(pub String);

/// A validated run identifier: exactly 8 lowercase hex characters.
///
/// Invariant: every `RunId` in the program went through [`RunId::parse`] or
/// [`RunId::generate`], which is what makes interpolating one into a remote
/// shell command safe. There is no other constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh id from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random();
        Self(format!("{:08x}", n))
    }

    /// Validate `s` as a run id.
    pub fn parse(s: &str) -> Result<Self, InvalidRunId> {
        let valid = s.len() == RUN_ID_LEN
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidRunId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = InvalidRunId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[path = "run_id_tests.rs"]
mod tests;
