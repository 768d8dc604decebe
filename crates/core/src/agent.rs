// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent records and identity derivation.
//!
//! An agent's canonical id is derived from `(env, hostname)` so that a
//! restarted agent resumes the same identity without a coordinated
//! handshake. The cloud reports an agent online iff a live connection
//! exists or its last heartbeat is within [`ONLINE_WINDOW_MS`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How long after the last heartbeat an agent without a live connection is
/// still reported online (2 minutes).
pub const ONLINE_WINDOW_MS: u64 = 2 * 60 * 1000;

/// Derive the canonical agent id from `(env, hostname)`.
///
/// `env-hostname` when an env (cluster name) is set, bare hostname otherwise.
pub fn canonical_agent_id(env: &str, hostname: &str) -> String {
    if env.is_empty() {
        hostname.to_string()
    } else {
        format!("{}-{}", env, hostname)
    }
}

/// Reported status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A registered agent as tracked by the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Canonical id (`env-hostname`, or hostname when env is empty)
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub version: String,
    /// Cluster / environment name; empty for standalone hosts
    #[serde(default)]
    pub env: String,
    /// Connection protocol recorded at upgrade time (`ws` or `wss`)
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub status: AgentStatus,
    /// Epoch milliseconds of the last register or heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

fn default_protocol() -> String {
    "ws".to_string()
}

impl AgentRecord {
    /// Whether `now_ms` is within the online window of the last heartbeat.
    pub fn seen_recently(&self, now_ms: u64) -> bool {
        match self.last_seen_ms {
            Some(seen) => now_ms.saturating_sub(seen) <= ONLINE_WINDOW_MS,
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
