// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task log sink.
//!
//! Plugins write leveled lines through a [`TaskLogger`]; the runtime drains
//! the channel into `task.log` frames. Emission is non-blocking: when the
//! channel is congested the line is dropped, matching the live-log
//! delivery contract (the cloud's durable store keeps what arrives).

use fc_core::{epoch_secs_now, LogLevel, TaskId};
use fc_wire::TaskLogData;
use tokio::sync::mpsc;

/// Capacity of the per-agent log channel.
pub const LOG_CHANNEL_CAPACITY: usize = 256;

/// Leveled log sink bound to one task.
#[derive(Clone)]
pub struct TaskLogger {
    task_id: TaskId,
    tx: mpsc::Sender<TaskLogData>,
}

impl TaskLogger {
    pub fn new(task_id: TaskId, tx: mpsc::Sender<TaskLogData>) -> Self {
        Self { task_id, tx }
    }

    /// Channel + logger pair for tests and standalone use.
    pub fn channel(task_id: TaskId) -> (Self, mpsc::Receiver<TaskLogData>) {
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        (Self::new(task_id, tx), rx)
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into());
    }

    /// Policy decisions and other audited actions.
    pub fn audit(&self, message: impl Into<String>) {
        self.emit(LogLevel::Audit, message.into());
    }

    fn emit(&self, level: LogLevel, message: String) {
        let data = TaskLogData {
            task_id: self.task_id.to_string(),
            level,
            message,
            timestamp: epoch_secs_now(),
        };
        if self.tx.try_send(data).is_err() {
            tracing::debug!(task_id = %self.task_id, "log channel congested; line dropped");
        }
    }
}
