// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail for command execution decisions.
//!
//! Records ride the tracing pipeline under `target: "audit"` so operators
//! can route them to a dedicated sink with an `EnvFilter` directive.

use fc_core::epoch_secs_now;
use serde::Serialize;
use std::time::Duration;

/// One audit record, serialized into the log line.
#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    timestamp: i64,
    agent_id: &'a str,
    task_id: &'a str,
    task_type: &'a str,
    command: &'a str,
    allowed: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    reason: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    result: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
}

/// Emits audit records for one agent.
#[derive(Clone)]
pub struct AuditLogger {
    agent_id: String,
}

impl AuditLogger {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }

    /// Record a command attempt and whether policy allowed it.
    pub fn command_attempt(
        &self,
        task_id: &str,
        task_type: &str,
        command: &str,
        allowed: bool,
        reason: &str,
    ) {
        self.write(AuditRecord {
            timestamp: epoch_secs_now(),
            agent_id: &self.agent_id,
            task_id,
            task_type,
            command,
            allowed,
            reason,
            result: "",
            error: "",
            duration_ms: None,
        });
    }

    /// Record the outcome of an allowed command.
    pub fn command_result(
        &self,
        task_id: &str,
        task_type: &str,
        command: &str,
        result: &str,
        error: Option<&str>,
        duration: Duration,
    ) {
        self.write(AuditRecord {
            timestamp: epoch_secs_now(),
            agent_id: &self.agent_id,
            task_id,
            task_type,
            command,
            allowed: true,
            reason: "",
            result,
            error: error.unwrap_or(""),
            duration_ms: Some(duration.as_millis() as u64),
        });
    }

    fn write(&self, record: AuditRecord<'_>) {
        match serde_json::to_string(&record) {
            Ok(json) => tracing::info!(target: "audit", allowed = record.allowed, "{}", json),
            Err(e) => tracing::warn!(target: "audit", error = %e, "unserializable audit record"),
        }
    }
}
