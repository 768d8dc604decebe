// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task lifecycle and per-task log fan-out.
//!
//! Log ingestion is durable-first: the record is written to the store before
//! any subscriber sees it, so dropped fan-out frames are recoverable from
//! history. Fan-out snapshots the subscriber list, writes outside the lock,
//! and prunes failed subscribers in a second phase.

use crate::registry::{AgentRegistry, RegistryError};
use fc_core::{
    epoch_ms_now, FileId, LogRecord, Task, TaskId, TaskStatus, TaskType,
};
use fc_storage::{Store, StoreError};
use fc_wire::{
    Connection, Message, MessageType, TaskCancelData, TaskCompleteData, TaskCreateData, TaskLogData,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// How many historical log lines are replayed to a new subscriber.
pub const LOG_REPLAY_LIMIT: u32 = 1000;

/// Errors from task operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("agent not online: {0}")]
    AgentNotOnline(String),

    #[error("failed to send task to agent: {0}")]
    SendFailed(#[from] RegistryError),

    #[error("task cannot be canceled: {0} is {1}")]
    TaskNotRunning(String, TaskStatus),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates tasks, records lifecycle transitions, and fans out logs.
pub struct TaskManager {
    store: Arc<Store>,
    registry: Arc<AgentRegistry>,
    /// task id → subscriber connections
    subscribers: RwLock<HashMap<String, Vec<Arc<Connection>>>>,
}

impl TaskManager {
    pub fn new(store: Arc<Store>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            store,
            registry,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a task and dispatch it to its target agent.
    ///
    /// The target must have a live connection. When a file id is given, the
    /// file's storage path and original name are attached to `params` before
    /// the task is serialized. Dispatch failure marks the task `failed`;
    /// successful dispatch moves it to `running`.
    pub fn create_task(
        &self,
        agent_id: &str,
        task_type: TaskType,
        command: &str,
        params: Option<serde_json::Map<String, serde_json::Value>>,
        file_id: Option<FileId>,
    ) -> Result<Task, DispatchError> {
        let task_type = task_type.normalize();

        if self.registry.get_connection(agent_id).is_none() {
            return Err(DispatchError::AgentNotOnline(agent_id.to_string()));
        }

        let mut params = params;
        if let Some(ref file_id) = file_id {
            match self.store.get_file(file_id.as_str()) {
                Ok(file) => {
                    let map = params.get_or_insert_with(Default::default);
                    map.insert("file_path".into(), file.path.clone().into());
                    map.insert("file_name".into(), file.name.clone().into());
                }
                Err(e) => {
                    tracing::warn!(%file_id, error = %e, "task references unknown file");
                }
            }
        }

        let now = epoch_ms_now();
        let task = Task {
            id: TaskId::new(),
            agent_id: agent_id.to_string(),
            task_type,
            status: TaskStatus::Pending,
            command: command.to_string(),
            params: params.clone().map(serde_json::Value::Object),
            file_id: file_id.clone(),
            result: String::new(),
            error: String::new(),
            started_at_ms: None,
            finished_at_ms: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store.create_task(&task)?;

        let data = TaskCreateData {
            task_id: task.id.to_string(),
            task_type,
            command: command.to_string(),
            params,
            file_id: file_id.map(|f| f.to_string()),
        };
        let msg = match Message::new(MessageType::TaskCreate, &data) {
            Ok(msg) => msg,
            Err(e) => {
                self.store.update_task_status(task.id.as_str(), TaskStatus::Failed)?;
                return Err(DispatchError::Store(StoreError::Corrupt {
                    column: "tasks.params",
                    value: e.to_string(),
                }));
            }
        };

        if let Err(e) = self.registry.send(agent_id, msg) {
            self.store.update_task_status(task.id.as_str(), TaskStatus::Failed)?;
            tracing::warn!(task_id = %task.id, %agent_id, error = %e, "task dispatch failed");
            return Err(DispatchError::SendFailed(e));
        }

        self.store.update_task_status(task.id.as_str(), TaskStatus::Running)?;
        tracing::info!(task_id = %task.id, %agent_id, task_type = %task_type, "task dispatched");
        Ok(self.store.get_task(task.id.as_str())?)
    }

    /// Apply a completion report from the agent, which owns ground truth for
    /// what ran. Idempotent on task id; a task already terminal is left
    /// untouched.
    pub fn complete_task(&self, data: &TaskCompleteData) -> Result<(), DispatchError> {
        let applied =
            self.store
                .complete_task(&data.task_id, data.status, &data.result, &data.error)?;
        if applied {
            tracing::info!(task_id = %data.task_id, status = %data.status, "task completed");
        } else {
            tracing::debug!(task_id = %data.task_id, "completion for terminal task ignored");
        }
        Ok(())
    }

    /// Cancel a pending or running task. The local status flips to
    /// `canceled` regardless of whether the cancel frame reached the agent.
    pub fn cancel_task(&self, task_id: &str) -> Result<(), DispatchError> {
        let task = self.store.get_task(task_id)?;
        if task.status.is_terminal() {
            return Err(DispatchError::TaskNotRunning(
                task_id.to_string(),
                task.status,
            ));
        }

        let data = TaskCancelData {
            task_id: task_id.to_string(),
        };
        if let Ok(msg) = Message::new(MessageType::TaskCancel, &data) {
            if let Err(e) = self.registry.send(&task.agent_id, msg) {
                tracing::warn!(%task_id, error = %e, "cancel frame not delivered");
            }
        }

        self.store.update_task_status(task_id, TaskStatus::Canceled)?;
        tracing::info!(%task_id, "task canceled");
        Ok(())
    }

    /// Persist a log record, then fan it out to subscribers.
    pub fn save_log(&self, data: &TaskLogData) -> Result<(), DispatchError> {
        let record = LogRecord {
            task_id: TaskId::from_string(&data.task_id),
            level: data.level,
            message: data.message.clone(),
            timestamp: data.timestamp,
        };
        // Durable write first: fan-out is best-effort.
        self.store.create_log(&record)?;
        self.broadcast_log(data);
        Ok(())
    }

    /// Add a subscriber and replay up to [`LOG_REPLAY_LIMIT`] historical
    /// lines, oldest first. The subscriber list lock is held across the
    /// replay so live fan-out cannot interleave with history.
    pub fn subscribe_logs(
        &self,
        task_id: &str,
        conn: Arc<Connection>,
    ) -> Result<usize, DispatchError> {
        let history = self.store.get_task_logs(task_id, LOG_REPLAY_LIMIT)?;

        let mut subs = self.subscribers.write();
        for record in &history {
            let data = TaskLogData {
                task_id: record.task_id.to_string(),
                level: record.level,
                message: record.message.clone(),
                timestamp: record.timestamp,
            };
            if let Ok(msg) = Message::new(MessageType::TaskLog, &data) {
                // Replay into the bounded queue is best-effort; the durable
                // store remains the source of truth.
                let _ = conn.write(msg);
            }
        }
        subs.entry(task_id.to_string()).or_default().push(conn);
        Ok(history.len())
    }

    /// Remove one subscriber connection from a task.
    pub fn unsubscribe_logs(&self, task_id: &str, conn: &Arc<Connection>) {
        let mut subs = self.subscribers.write();
        if let Some(list) = subs.get_mut(task_id) {
            list.retain(|c| !Arc::ptr_eq(c, conn));
            if list.is_empty() {
                subs.remove(task_id);
            }
        }
    }

    /// Drop every subscription held by `conn` (its socket closed).
    pub fn drop_subscriber(&self, conn: &Arc<Connection>) {
        let mut subs = self.subscribers.write();
        subs.retain(|_, list| {
            list.retain(|c| !Arc::ptr_eq(c, conn));
            !list.is_empty()
        });
    }

    pub fn subscriber_count(&self, task_id: &str) -> usize {
        self.subscribers
            .read()
            .get(task_id)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Two-phase fan-out: snapshot under the read lock, write outside it,
    /// prune failed subscribers under the write lock.
    fn broadcast_log(&self, data: &TaskLogData) {
        let snapshot: Vec<Arc<Connection>> = {
            let subs = self.subscribers.read();
            match subs.get(&data.task_id) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        let Ok(msg) = Message::new(MessageType::TaskLog, data) else {
            return;
        };

        let mut stale: Vec<Arc<Connection>> = Vec::new();
        for conn in &snapshot {
            if conn.is_closed() || conn.write(msg.clone()).is_err() {
                stale.push(Arc::clone(conn));
            }
        }

        if stale.is_empty() {
            return;
        }

        let mut subs = self.subscribers.write();
        if let Some(list) = subs.get_mut(&data.task_id) {
            list.retain(|c| !stale.iter().any(|s| Arc::ptr_eq(s, c)));
            if list.is_empty() {
                subs.remove(&data.task_id);
            }
        }
        for conn in &stale {
            tracing::debug!(
                task_id = %data.task_id,
                dropped_frames = conn.dropped_frames(),
                "pruned log subscriber"
            );
        }
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
