// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor manager: plugin registry, concurrency gates, cancellation.
//!
//! Two counting semaphores gate execution — a global one and a per-type
//! one, each optional. Every invocation runs under a per-type deadline in
//! its own task so plugin panics are contained at this boundary.

use crate::logger::TaskLogger;
use crate::plugins::{ExecRequest, ExecuteError, Executor};
use fc_core::{TaskId, TaskType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Errors from manager-level operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("executor not found for type: {0}")]
    ExecutorNotFound(TaskType),

    #[error("task not running: {0}")]
    TaskNotRunning(String),
}

/// Concurrency limits; 0 disables a gate.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub max_concurrency: usize,
    pub type_concurrency: HashMap<TaskType, usize>,
}

/// Registry of executor plugins with gating and per-task cancellation.
pub struct ExecutorManager {
    executors: HashMap<TaskType, Arc<dyn Executor>>,
    running: Mutex<HashMap<TaskId, CancellationToken>>,
    global: Option<Arc<Semaphore>>,
    per_type: HashMap<TaskType, Arc<Semaphore>>,
    deadlines: HashMap<TaskType, Duration>,
}

impl std::fmt::Debug for ExecutorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorManager").finish_non_exhaustive()
    }
}

impl ExecutorManager {
    pub fn new(config: ManagerConfig) -> Self {
        let global = match config.max_concurrency {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let per_type = config
            .type_concurrency
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(ty, n)| (ty, Arc::new(Semaphore::new(n))))
            .collect();

        Self {
            executors: HashMap::new(),
            running: Mutex::new(HashMap::new()),
            global,
            per_type,
            deadlines: HashMap::new(),
        }
    }

    pub fn register_executor(&mut self, executor: Arc<dyn Executor>) {
        let ty = executor.task_type();
        tracing::info!(task_type = %ty, "executor registered");
        self.executors.insert(ty, executor);
    }

    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<_> = self.executors.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    /// Override the default deadline for a task type.
    pub fn set_deadline(&mut self, ty: TaskType, deadline: Duration) {
        self.deadlines.insert(ty, deadline);
    }

    fn deadline_for(&self, ty: TaskType) -> Duration {
        if let Some(deadline) = self.deadlines.get(&ty) {
            return *deadline;
        }
        match ty {
            TaskType::Shell | TaskType::K8s | TaskType::Helm => Duration::from_secs(30 * 60),
            _ => Duration::from_secs(10 * 60),
        }
    }

    /// Execute one task end to end: resolve the plugin, take both gates,
    /// register a cancellation handle, run under the deadline, clean up.
    pub async fn execute(
        &self,
        task_type: TaskType,
        req: ExecRequest,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let task_type = task_type.normalize();
        let Some(plugin) = self.executors.get(&task_type) else {
            return Err(ExecuteError::Input(
                ManagerError::ExecutorNotFound(task_type).to_string(),
            ));
        };

        // Both gates block until capacity frees up; queued work is bounded
        // by the dispatcher rather than spawning unchecked.
        let _global = match &self.global {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| ExecuteError::Internal)?,
            ),
            None => None,
        };
        let _typed = match self.per_type.get(&task_type) {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| ExecuteError::Internal)?,
            ),
            None => None,
        };

        let token = CancellationToken::new();
        self.running
            .lock()
            .insert(req.task_id.clone(), token.clone());

        let result = self
            .run_isolated(Arc::clone(plugin), req.clone(), logger.clone(), token.clone())
            .await;

        self.running.lock().remove(&req.task_id);
        result
    }

    /// Run the plugin in its own task: a panic there is recovered here and
    /// reported as a generic internal failure instead of killing the agent.
    async fn run_isolated(
        &self,
        plugin: Arc<dyn Executor>,
        req: ExecRequest,
        logger: TaskLogger,
        token: CancellationToken,
    ) -> Result<String, ExecuteError> {
        let deadline = self.deadline_for(plugin.task_type());

        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            plugin.execute(&req, &logger, &run_token).await
        });

        tokio::select! {
            joined = handle => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    tracing::error!("executor plugin panicked");
                    Err(ExecuteError::Internal)
                }
                Err(_) => Err(ExecuteError::Canceled),
            },
            _ = token.cancelled() => Err(ExecuteError::Canceled),
            _ = tokio::time::sleep(deadline) => {
                token.cancel();
                Err(ExecuteError::Timeout)
            }
        }
    }

    /// Trigger cancellation for a running task.
    pub fn cancel(&self, task_id: &str) -> Result<(), ManagerError> {
        match self.running.lock().remove(task_id) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(ManagerError::TaskNotRunning(task_id.to_string())),
        }
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
