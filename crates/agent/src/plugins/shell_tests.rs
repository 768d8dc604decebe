// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::{LogLevel, TaskId};
use fc_wire::TaskLogData;
use tokio::sync::mpsc;

fn executor() -> ShellExecutor {
    // Empty path: permissive default (deny-list still wired, but empty).
    ShellExecutor::new("test-agent", "").unwrap()
}

fn request(command: &str) -> ExecRequest {
    ExecRequest::new(TaskId::new(), command)
}

fn drain(rx: &mut mpsc::Receiver<TaskLogData>) -> Vec<TaskLogData> {
    let mut out = Vec::new();
    while let Ok(line) = rx.try_recv() {
        out.push(line);
    }
    out
}

#[tokio::test]
async fn echo_round_trip_produces_output_and_logs() {
    let exec = executor();
    let req = request("echo hi");
    let (logger, mut rx) = TaskLogger::channel(req.task_id.clone());
    let cancel = CancellationToken::new();

    let result = exec.execute(&req, &logger, &cancel).await.unwrap();
    assert!(result.contains("hi\n"));

    let logs = drain(&mut rx);
    assert!(logs.iter().any(|l| l.message.contains("Executing command")));
    assert!(logs
        .iter()
        .any(|l| l.message.contains("Command completed successfully")));
    assert!(logs.len() >= 2);
}

#[tokio::test]
async fn stderr_lines_are_logged_at_error_level() {
    let exec = executor();
    let req = request("echo oops >&2");
    let (logger, mut rx) = TaskLogger::channel(req.task_id.clone());

    let result = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.contains("oops"));

    let logs = drain(&mut rx);
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Error && l.message == "oops"));
}

#[tokio::test]
async fn empty_command_is_an_input_error() {
    let exec = executor();
    let req = request("");
    let (logger, _rx) = TaskLogger::channel(req.task_id.clone());

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn nonzero_exit_preserves_partial_output() {
    let exec = executor();
    let req = request("echo before; exit 3");
    let (logger, _rx) = TaskLogger::channel(req.task_id.clone());

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ExecuteError::Failed { error, output } => {
            assert!(error.contains("status 3"));
            assert!(output.contains("before"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn deny_listed_command_never_spawns_a_process() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("security.yaml");
    std::fs::write(
        &config,
        "command_whitelist_enabled: false\nblocked_patterns:\n- pattern: '.*\\bsudo\\b.*'\n  reason: privilege escalation\n",
    )
    .unwrap();

    let marker = dir.path().join("ran");
    let exec = ShellExecutor::new("test-agent", config.to_str().unwrap()).unwrap();
    let req = request(&format!("sudo touch {}", marker.display()));
    let (logger, mut rx) = TaskLogger::channel(req.task_id.clone());

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
    assert!(err.to_string().contains("security"));
    assert!(!marker.exists(), "blocked command must not run");

    let logs = drain(&mut rx);
    assert!(logs
        .iter()
        .any(|l| l.message.contains("blocked by security policy")));
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    let exec = executor();
    let req = request("sleep 30");
    let (logger, _rx) = TaskLogger::channel(req.task_id.clone());
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        cancel_clone.cancel();
    });

    let start = std::time::Instant::now();
    let err = exec.execute(&req, &logger, &cancel).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Canceled));
    assert!(start.elapsed() < std::time::Duration::from_secs(5));
}
