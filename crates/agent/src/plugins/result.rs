// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured execution results for database-style plugins.
//!
//! Rendered to text for transport by default; JSON mode is available so
//! callers can consume the rollup programmatically.

use serde::{Deserialize, Serialize};

/// Per-run rollup of statement results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub run_id: String,
    pub task_id: String,
    pub success: bool,
    /// 0 = ok, 1 = warn, 2 = error
    pub error_level: i32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rows_affected: i64,
    /// Execution stage tag (`CHECKED`, `EXECUTED`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage: String,
    /// Rollback statements produced by the review gateway, when available
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rollback_sql: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backup_dbname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execute_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_msg: String,
    /// Seconds since epoch
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_at: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_at: i64,
    /// Rendered text (backward-compatible transport format)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text_result: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl ExecutionResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Plain-text rendering used when no richer text result exists.
    pub fn to_text(&self) -> String {
        if !self.text_result.is_empty() {
            return self.text_result.clone();
        }

        let mut out = String::new();
        if !self.error_msg.is_empty() {
            out.push_str(&format!("Error: {}\n", self.error_msg));
        }
        if self.rows_affected > 0 {
            out.push_str(&format!("Affected Rows: {}\n", self.rows_affected));
        }
        if !self.execute_time.is_empty() {
            out.push_str(&format!("Execute Time: {}\n", self.execute_time));
        }
        if !self.stage.is_empty() {
            out.push_str(&format!("Stage: {}\n", self.stage));
        }
        out
    }

    /// Render for transport.
    pub fn render(&self, as_json: bool) -> String {
        if as_json {
            self.to_json().unwrap_or_else(|_| self.to_text())
        } else {
            self.to_text()
        }
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
