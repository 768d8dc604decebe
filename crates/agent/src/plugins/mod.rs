// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor plugins, one per task type.
//!
//! Every plugin honors the same contract: take a request and a log sink,
//! respect the cancellation token, return a rendered result string or an
//! error. The manager owns deadlines, gating, and panic isolation.

pub mod api;
pub mod clickhouse;
pub mod elasticsearch;
pub mod file;
pub mod helm;
pub mod k8s;
pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod result;
pub mod shell;
pub mod sql_file;

use crate::logger::TaskLogger;
use async_trait::async_trait;
use fc_core::{TaskId, TaskType};
use tokio_util::sync::CancellationToken;

/// Errors a plugin can surface.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// Missing or malformed input; surfaced to the caller verbatim.
    #[error("{0}")]
    Input(String),

    /// Rejected by a policy validator; terminal, audited.
    #[error("security validation failed: {0}")]
    Policy(String),

    /// The underlying service (DB, HTTP, K8s, subprocess) failed.
    #[error("{0}")]
    Service(String),

    /// The command ran but failed; output produced so far is preserved so
    /// the completion report can carry both result text and error.
    #[error("{error}")]
    Failed { error: String, output: String },

    /// Deadline exceeded; stamped by the manager.
    #[error("execution timed out")]
    Timeout,

    /// Task canceled while running.
    #[error("task canceled")]
    Canceled,

    /// Plugin panic recovered at the executor boundary.
    #[error("internal executor error")]
    Internal,
}

/// One dispatched unit of work as the plugin sees it.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub task_id: TaskId,
    pub command: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub file_id: Option<String>,
}

impl ExecRequest {
    pub fn new(task_id: TaskId, command: impl Into<String>) -> Self {
        Self {
            task_id,
            command: command.into(),
            params: serde_json::Map::new(),
            file_id: None,
        }
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(|v| v.as_bool())
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    pub fn param_object(&self, key: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.params.get(key).and_then(|v| v.as_object())
    }
}

/// Uniform executor contract.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Task type tag this plugin serves.
    fn task_type(&self) -> TaskType;

    /// Run the task. Long I/O must observe `cancel` and abort.
    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError>;
}

/// Tunables shared by the database-style plugins, parsed from
/// `params.exec_options`.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub trans_batch_size: u32,
    pub backup: bool,
    pub sleep_ms: u64,
    pub timeout_ms: u64,
    pub concurrency: u32,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            trans_batch_size: 200,
            backup: false,
            sleep_ms: 0,
            timeout_ms: 600_000,
            concurrency: 1,
        }
    }
}

impl ExecOptions {
    pub fn from_params(params: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut opts = Self::default();

        // Legacy flag kept for old callers.
        if params.get("no_backup").and_then(|v| v.as_bool()) == Some(true) {
            opts.backup = false;
        }

        let Some(raw) = params.get("exec_options").and_then(|v| v.as_object()) else {
            return opts;
        };
        if let Some(v) = raw.get("trans_batch_size").and_then(|v| v.as_u64()) {
            opts.trans_batch_size = v as u32;
        }
        if let Some(v) = raw.get("backup").and_then(|v| v.as_bool()) {
            opts.backup = v;
        }
        if let Some(v) = raw.get("sleep_ms").and_then(|v| v.as_u64()) {
            opts.sleep_ms = v;
        }
        if let Some(v) = raw.get("timeout_ms").and_then(|v| v.as_u64()) {
            opts.timeout_ms = v;
        }
        if let Some(v) = raw.get("concurrency").and_then(|v| v.as_u64()) {
            opts.concurrency = v as u32;
        }
        opts
    }
}
