// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelope and type tags.

use fc_core::epoch_secs_now;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "agent.register")]
    AgentRegister,
    #[serde(rename = "agent.heartbeat")]
    AgentHeartbeat,
    #[serde(rename = "agent.status")]
    AgentStatus,

    #[serde(rename = "task.create")]
    TaskCreate,
    #[serde(rename = "task.start")]
    TaskStart,
    #[serde(rename = "task.log")]
    TaskLog,
    #[serde(rename = "task.complete")]
    TaskComplete,
    #[serde(rename = "task.cancel")]
    TaskCancel,
    #[serde(rename = "task.subscribe_logs")]
    TaskSubscribeLogs,

    #[serde(rename = "file.upload")]
    FileUpload,
    #[serde(rename = "file.download")]
    FileDownload,
    #[serde(rename = "file.distribute")]
    FileDistribute,

    #[serde(rename = "error")]
    Error,

    /// Catch-all for tags from newer or foreign peers; routed to an error
    /// reply rather than dropped.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::AgentRegister => "agent.register",
            Self::AgentHeartbeat => "agent.heartbeat",
            Self::AgentStatus => "agent.status",
            Self::TaskCreate => "task.create",
            Self::TaskStart => "task.start",
            Self::TaskLog => "task.log",
            Self::TaskComplete => "task.complete",
            Self::TaskCancel => "task.cancel",
            Self::TaskSubscribeLogs => "task.subscribe_logs",
            Self::FileUpload => "file.upload",
            Self::FileDownload => "file.download",
            Self::FileDistribute => "file.distribute",
            Self::Error => "error",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", tag)
    }
}

/// One JSON frame on the wire.
///
/// `request_id` correlates a response to the request that carried it.
/// `timestamp` is seconds since epoch and is stamped at receipt when the
/// producer sent 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Build a message carrying `data`, stamped with the current time.
    pub fn new<T: Serialize>(msg_type: MessageType, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            msg_type,
            id: None,
            request_id: None,
            data: Some(serde_json::to_value(data)?),
            error: None,
            timestamp: epoch_secs_now(),
        })
    }

    /// Build a bare message with no payload.
    pub fn bare(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            id: None,
            request_id: None,
            data: None,
            error: None,
            timestamp: epoch_secs_now(),
        }
    }

    /// Build an error reply, correlated when `request_id` is non-empty.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            msg_type: MessageType::Error,
            id: None,
            request_id: request_id.filter(|r| !r.is_empty()),
            data: None,
            error: Some(message.into()),
            timestamp: epoch_secs_now(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Deserialize the payload into a typed structure.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let value = self.data.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
