// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task log records.

use crate::id::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a task log line. `Audit` marks policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Audit,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Audit => write!(f, "audit"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            // "warning" appears in logs produced by older agents
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "audit" => Ok(Self::Audit),
            _ => Err(()),
        }
    }
}

/// One appended log line for a task. Never mutated after the durable write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub task_id: TaskId,
    pub level: LogLevel,
    pub message: String,
    /// Seconds since epoch, stamped at receipt when the producer sent 0
    pub timestamp: i64,
}
