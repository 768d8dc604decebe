// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Stub plugin with controllable behavior.
struct StubExecutor {
    ty: TaskType,
    delay_ms: u64,
    panic: bool,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl StubExecutor {
    fn new(ty: TaskType) -> Self {
        Self {
            ty,
            delay_ms: 0,
            panic: false,
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }
}

#[async_trait]
impl Executor for StubExecutor {
    fn task_type(&self) -> TaskType {
        self.ty
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        _logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        if self.panic {
            panic!("stub blew up");
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let outcome = tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.delay_ms)) => {
                Ok(format!("done:{}", req.command))
            }
            _ = cancel.cancelled() => Err(ExecuteError::Canceled),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

fn request(command: &str) -> ExecRequest {
    ExecRequest::new(TaskId::new(), command)
}

fn logger() -> TaskLogger {
    TaskLogger::channel(TaskId::from_string("t")).0
}

#[tokio::test]
async fn executes_through_the_registered_plugin() {
    let mut mgr = ExecutorManager::new(ManagerConfig::default());
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Shell)));

    let result = mgr
        .execute(TaskType::Shell, request("a"), &logger())
        .await
        .unwrap();
    assert_eq!(result, "done:a");
    assert_eq!(mgr.running_count(), 0);
}

#[tokio::test]
async fn unknown_type_reports_executor_not_found() {
    let mgr = ExecutorManager::new(ManagerConfig::default());
    let err = mgr
        .execute(TaskType::Helm, request("x"), &logger())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("executor not found"));
}

#[tokio::test]
async fn sql_alias_resolves_to_the_mysql_plugin() {
    let mut mgr = ExecutorManager::new(ManagerConfig::default());
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Mysql)));

    let result = mgr
        .execute(TaskType::Sql, request("SELECT 1"), &logger())
        .await
        .unwrap();
    assert!(result.starts_with("done:"));
}

#[tokio::test]
async fn global_gate_bounds_concurrency() {
    let stub = StubExecutor::new(TaskType::Shell).with_delay(50);
    let max_active = Arc::clone(&stub.max_active);

    let mut mgr = ExecutorManager::new(ManagerConfig {
        max_concurrency: 2,
        type_concurrency: HashMap::new(),
    });
    mgr.register_executor(Arc::new(stub));
    let mgr = Arc::new(mgr);

    let mut handles = Vec::new();
    for i in 0..6 {
        let mgr = Arc::clone(&mgr);
        handles.push(tokio::spawn(async move {
            mgr.execute(TaskType::Shell, request(&i.to_string()), &logger())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(max_active.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn per_type_gate_is_independent_of_global() {
    let gated = StubExecutor::new(TaskType::Mysql).with_delay(50);
    let gated_max = Arc::clone(&gated.max_active);
    let free = StubExecutor::new(TaskType::Shell).with_delay(50);
    let free_max = Arc::clone(&free.max_active);

    let mut mgr = ExecutorManager::new(ManagerConfig {
        max_concurrency: 0,
        type_concurrency: HashMap::from([(TaskType::Mysql, 1)]),
    });
    mgr.register_executor(Arc::new(gated));
    mgr.register_executor(Arc::new(free));
    let mgr = Arc::new(mgr);

    let mut handles = Vec::new();
    for i in 0..4 {
        let mgr1 = Arc::clone(&mgr);
        handles.push(tokio::spawn(async move {
            mgr1.execute(TaskType::Mysql, request(&i.to_string()), &logger())
                .await
        }));
        let mgr2 = Arc::clone(&mgr);
        handles.push(tokio::spawn(async move {
            mgr2.execute(TaskType::Shell, request(&i.to_string()), &logger())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(gated_max.load(Ordering::SeqCst), 1);
    assert!(free_max.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn cancel_interrupts_a_running_task() {
    let mut mgr = ExecutorManager::new(ManagerConfig::default());
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Shell).with_delay(30_000)));
    let mgr = Arc::new(mgr);

    let req = request("long");
    let task_id = req.task_id.to_string();

    let run = {
        let mgr = Arc::clone(&mgr);
        tokio::spawn(async move { mgr.execute(TaskType::Shell, req, &logger()).await })
    };

    // Wait for the task to register its cancellation handle.
    for _ in 0..100 {
        if mgr.running_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    mgr.cancel(&task_id).unwrap();
    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, ExecuteError::Canceled));

    // The handle is gone; a second cancel is TaskNotRunning.
    assert!(matches!(
        mgr.cancel(&task_id),
        Err(ManagerError::TaskNotRunning(_))
    ));
}

#[tokio::test]
async fn cancel_of_unknown_task_is_task_not_running() {
    let mgr = ExecutorManager::new(ManagerConfig::default());
    assert!(matches!(
        mgr.cancel("ghost"),
        Err(ManagerError::TaskNotRunning(_))
    ));
}

#[tokio::test]
async fn plugin_panics_become_internal_failures() {
    let mut mgr = ExecutorManager::new(ManagerConfig::default());
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Shell).panicking()));
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Api)));

    let err = mgr
        .execute(TaskType::Shell, request("boom"), &logger())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Internal));
    assert_eq!(mgr.running_count(), 0);

    // The manager survives and other plugins still run.
    let ok = mgr
        .execute(TaskType::Api, request("still-fine"), &logger())
        .await
        .unwrap();
    assert_eq!(ok, "done:still-fine");
}

#[tokio::test]
async fn deadline_produces_a_timeout_failure() {
    let mut mgr = ExecutorManager::new(ManagerConfig::default());
    mgr.register_executor(Arc::new(StubExecutor::new(TaskType::Shell).with_delay(60_000)));
    mgr.set_deadline(TaskType::Shell, Duration::from_millis(100));

    let err = mgr
        .execute(TaskType::Shell, request("slow"), &logger())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Timeout));
}
