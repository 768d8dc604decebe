// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors that carry a process exit code.

/// An error paired with the exit code the process should end with.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub error: anyhow::Error,
}

impl ExitError {
    /// Generic failure (exit 1).
    pub fn new(error: anyhow::Error) -> Self {
        Self { code: 1, error }
    }

    /// Failure with an explicit code (e.g. terminal task failure).
    pub fn with_code(code: i32, error: anyhow::Error) -> Self {
        Self { code, error }
    }
}

impl From<anyhow::Error> for ExitError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

impl From<reqwest::Error> for ExitError {
    fn from(error: reqwest::Error) -> Self {
        Self::new(error.into())
    }
}
