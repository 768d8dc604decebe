// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime: register, heartbeat, dispatch, reconnect.
//!
//! One session per connection. The session loop multiplexes the inbound
//! message stream, the 30-second heartbeat ticker, and the per-task log
//! channel; any transport failure tears the session down and the outer
//! loop re-dials every 5 seconds.

use crate::client::Client;
use crate::executor::ExecutorManager;
use crate::logger::{TaskLogger, LOG_CHANNEL_CAPACITY};
use crate::plugins::{ExecRequest, ExecuteError};
use fc_core::{TaskId, TaskStatus};
use fc_wire::{
    Connection, HeartbeatData, Message, MessageType, RegisterAck, TaskCancelData, TaskCompleteData,
    TaskCreateData, TaskLogData,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Heartbeat interval.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// The long-lived agent process.
pub struct Agent {
    client: Client,
    executor: Arc<ExecutorManager>,
}

impl Agent {
    pub fn new(client: Client, executor: ExecutorManager) -> Self {
        Self {
            client,
            executor: Arc::new(executor),
        }
    }

    /// Run until `shutdown` fires: connect, register, serve, reconnect.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }

            match self.client.connect().await {
                Ok(conn) => {
                    if let Err(e) = self.client.register(&conn).await {
                        tracing::warn!(error = %e, "registration failed");
                    } else {
                        tracing::info!("agent started and ready to receive tasks");
                        self.serve_connection(Arc::clone(&conn), &shutdown).await;
                    }
                    conn.close();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "connection failed");
                }
            }

            if shutdown.is_cancelled() {
                return;
            }
            tracing::info!(delay = ?RECONNECT_DELAY, "reconnecting to cloud");
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }

    /// Serve one registered connection until it dies.
    pub async fn serve_connection(&self, conn: Arc<Connection>, shutdown: &CancellationToken) {
        let (log_tx, mut log_rx) = mpsc::channel::<TaskLogData>(LOG_CHANNEL_CAPACITY);

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        heartbeat.reset(); // first tick after a full interval, not at once

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,

                msg = conn.read() => {
                    let Some(msg) = msg else {
                        tracing::warn!("connection to cloud lost");
                        return;
                    };
                    self.dispatch(msg, &conn, &log_tx);
                }

                _ = heartbeat.tick() => {
                    let data = HeartbeatData {
                        agent_id: self.client.agent_id().to_string(),
                    };
                    let beat = match Message::new(MessageType::AgentHeartbeat, &data) {
                        Ok(beat) => beat,
                        Err(_) => continue,
                    };
                    if conn.write(beat).is_err() {
                        tracing::warn!("heartbeat failed; reconnecting");
                        return;
                    }
                }

                Some(line) = log_rx.recv() => {
                    if let Ok(msg) = Message::new(MessageType::TaskLog, &line) {
                        if conn.write(msg).is_err() {
                            tracing::debug!(task_id = %line.task_id, "log frame not delivered");
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, msg: Message, conn: &Arc<Connection>, log_tx: &mpsc::Sender<TaskLogData>) {
        match msg.msg_type {
            MessageType::TaskCreate => {
                let data = match msg.parse_data::<TaskCreateData>() {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed task.create payload");
                        return;
                    }
                };
                tracing::info!(task_id = %data.task_id, task_type = %data.task_type, "task received");
                self.spawn_task(data, Arc::clone(conn), log_tx.clone());
            }

            MessageType::TaskCancel => {
                let Ok(data) = msg.parse_data::<TaskCancelData>() else {
                    return;
                };
                match self.executor.cancel(&data.task_id) {
                    Ok(()) => {
                        let logger =
                            TaskLogger::new(TaskId::from_string(&data.task_id), log_tx.clone());
                        logger.info("Task canceled");
                    }
                    Err(e) => tracing::debug!(task_id = %data.task_id, error = %e, "cancel ignored"),
                }
            }

            MessageType::AgentStatus => {
                match msg.parse_data::<RegisterAck>() {
                    Ok(ack) => {
                        tracing::info!(agent_id = %ack.agent_id, status = %ack.status, "status from cloud")
                    }
                    Err(_) => tracing::info!("status update from cloud"),
                }
            }

            other => {
                tracing::warn!(msg_type = %other, "unexpected message type");
            }
        }
    }

    /// Run one task concurrently with the session loop.
    fn spawn_task(
        &self,
        data: TaskCreateData,
        conn: Arc<Connection>,
        log_tx: mpsc::Sender<TaskLogData>,
    ) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let task_id = TaskId::from_string(&data.task_id);
            let logger = TaskLogger::new(task_id.clone(), log_tx);
            logger.info("Task started");

            let req = ExecRequest {
                task_id: task_id.clone(),
                command: data.command.clone(),
                params: data.params.clone().unwrap_or_default(),
                file_id: data.file_id.clone(),
            };

            let outcome = executor.execute(data.task_type, req, &logger).await;

            let (status, result, error) = match outcome {
                Ok(result) => {
                    logger.info("Task completed successfully");
                    (TaskStatus::Success, result, String::new())
                }
                Err(ExecuteError::Canceled) => {
                    (TaskStatus::Canceled, String::new(), "task canceled".to_string())
                }
                Err(ExecuteError::Failed { error, output }) => {
                    logger.error(format!("Task failed: {}", error));
                    (TaskStatus::Failed, output, error)
                }
                Err(e) => {
                    let error = e.to_string();
                    logger.error(format!("Task failed: {}", error));
                    (TaskStatus::Failed, String::new(), error)
                }
            };

            let complete = TaskCompleteData {
                task_id: task_id.to_string(),
                status,
                result,
                error,
                timestamp: fc_core::epoch_secs_now(),
            };
            match Message::new(MessageType::TaskComplete, &complete) {
                Ok(msg) => {
                    if conn.write(msg).is_err() {
                        tracing::warn!(%task_id, "completion report not delivered");
                    }
                }
                Err(e) => tracing::error!(%task_id, error = %e, "unserializable completion"),
            }
        });
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
