// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed payloads carried in the `data` field of wire messages.

use fc_core::{LogLevel, TaskStatus, TaskType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload of `agent.register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    pub agent_id: String,
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub version: String,
    /// K8s cluster name; empty for standalone hosts
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Payload of `agent.heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub agent_id: String,
}

/// Payload of the `agent.status` reply to a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAck {
    pub status: String,
    /// Canonical id assigned by the cloud (`env-hostname`)
    pub agent_id: String,
}

/// Payload of `task.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreateData {
    pub task_id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// Payload of `task.log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogData {
    pub task_id: String,
    pub level: LogLevel,
    pub message: String,
    /// Seconds since epoch; 0 means "stamp at receipt"
    #[serde(default)]
    pub timestamp: i64,
}

/// Payload of `task.complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteData {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Payload of `task.cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCancelData {
    pub task_id: String,
}

/// Payload of `task.subscribe_logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeLogsData {
    pub task_id: String,
}

/// Payload of the `task.subscribe_logs` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeAck {
    pub task_id: String,
    pub status: String,
}

/// Payload of `file.distribute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDistributeData {
    pub file_id: String,
    pub agent_ids: Vec<String>,
    /// Target path on the agents; empty means the executor's base path
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}
