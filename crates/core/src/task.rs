// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records, types, and the lifecycle state machine.

use crate::id::{FileId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of work a task carries; selects the executor plugin on the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Shell,
    Mysql,
    Postgres,
    Clickhouse,
    Mongo,
    Elasticsearch,
    K8s,
    Helm,
    Api,
    File,
    /// Deprecated alias kept for old callers; dispatches as `mysql`.
    #[serde(rename = "sql")]
    Sql,
}

impl TaskType {
    /// Collapse deprecated aliases onto their current type.
    pub fn normalize(self) -> Self {
        match self {
            Self::Sql => Self::Mysql,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Clickhouse => "clickhouse",
            Self::Mongo => "mongo",
            Self::Elasticsearch => "elasticsearch",
            Self::K8s => "k8s",
            Self::Helm => "helm",
            Self::Api => "api",
            Self::File => "file",
            Self::Sql => "sql",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(Self::Shell),
            "mysql" => Ok(Self::Mysql),
            "sql" => Ok(Self::Sql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "clickhouse" => Ok(Self::Clickhouse),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "elasticsearch" => Ok(Self::Elasticsearch),
            "k8s" => Ok(Self::K8s),
            "helm" => Ok(Self::Helm),
            "api" => Ok(Self::Api),
            "file" => Ok(Self::File),
            other => Err(UnknownTaskType(other.to_string())),
        }
    }
}

/// Error for unrecognized task type strings.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown task type: {0}")]
pub struct UnknownTaskType(pub String);

/// Lifecycle status of a task.
///
/// Transitions form a DAG: pending → running → {success, failed, canceled},
/// plus pending → {failed, canceled} for dispatch failures and early
/// cancellation. Terminal states are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Running | Self::Success | Self::Failed | Self::Canceled
            ),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(UnknownTaskType(other.to_string())),
        }
    }
}

/// A single unit of work dispatched to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Command text or script content; meaning depends on the task type
    #[serde(default)]
    pub command: String,
    /// Structured parameters passed through to the executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
