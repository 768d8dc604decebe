// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{build_manager, PluginConfig};
use fc_core::{LogLevel, TaskType};
use fc_wire::test_support::{connection, TestPeer};

fn agent() -> Agent {
    let client = Client::new("http://localhost:9", "instance-1", "test-agent");
    let manager = build_manager("instance-1", &PluginConfig::default(), "").unwrap();
    Agent::new(client, manager)
}

fn task_create(task_id: &str, task_type: TaskType, command: &str) -> Message {
    Message::new(
        MessageType::TaskCreate,
        &TaskCreateData {
            task_id: task_id.into(),
            task_type,
            command: command.into(),
            params: None,
            file_id: None,
        },
    )
    .unwrap()
}

/// Collect frames from the peer until a completion for `task_id` arrives.
async fn collect_until_complete(
    peer: &mut TestPeer,
    task_id: &str,
) -> (Vec<TaskLogData>, TaskCompleteData) {
    let mut logs = Vec::new();
    loop {
        let msg = peer.next_message().await;
        match msg.msg_type {
            MessageType::TaskLog => {
                let data: TaskLogData = msg.parse_data().unwrap();
                if data.task_id == task_id {
                    logs.push(data);
                }
            }
            MessageType::TaskComplete => {
                let data: TaskCompleteData = msg.parse_data().unwrap();
                if data.task_id == task_id {
                    return (logs, data);
                }
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn shell_task_round_trips_to_a_success_completion() {
    let agent = Arc::new(agent());
    let (conn, mut peer) = connection("ws");
    let shutdown = CancellationToken::new();

    let session = {
        let agent = Arc::clone(&agent);
        let conn = Arc::clone(&conn);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.serve_connection(conn, &shutdown).await })
    };

    peer.push(&task_create("t-echo", TaskType::Shell, "echo hi"));

    let (logs, complete) = collect_until_complete(&mut peer, "t-echo").await;
    assert_eq!(complete.status, TaskStatus::Success);
    assert!(complete.result.contains("hi\n"));
    assert!(complete.error.is_empty());

    let messages: Vec<_> = logs.iter().map(|l| l.message.as_str()).collect();
    assert!(messages.contains(&"Task started"));
    assert!(messages.iter().any(|m| m.contains("Executing command")));
    assert!(messages
        .iter()
        .any(|m| m.contains("Command completed successfully")));
    assert!(messages.contains(&"Task completed successfully"));

    shutdown.cancel();
    session.await.unwrap();
}

#[tokio::test]
async fn failing_task_reports_failed_with_the_error() {
    let agent = Arc::new(agent());
    let (conn, mut peer) = connection("ws");
    let shutdown = CancellationToken::new();

    let _session = {
        let agent = Arc::clone(&agent);
        let conn = Arc::clone(&conn);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.serve_connection(conn, &shutdown).await })
    };

    peer.push(&task_create("t-fail", TaskType::Shell, "exit 7"));

    let (_logs, complete) = collect_until_complete(&mut peer, "t-fail").await;
    assert_eq!(complete.status, TaskStatus::Failed);
    assert!(complete.error.contains("status 7"));

    shutdown.cancel();
}

#[tokio::test]
async fn unknown_executor_type_fails_the_task() {
    let agent = Arc::new(agent());
    let (conn, mut peer) = connection("ws");
    let shutdown = CancellationToken::new();

    let _session = {
        let agent = Arc::clone(&agent);
        let conn = Arc::clone(&conn);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.serve_connection(conn, &shutdown).await })
    };

    // The default set has no mongo executor.
    peer.push(&task_create("t-mongo", TaskType::Mongo, "{}"));

    let (_logs, complete) = collect_until_complete(&mut peer, "t-mongo").await;
    assert_eq!(complete.status, TaskStatus::Failed);
    assert!(complete.error.contains("executor not found"));

    shutdown.cancel();
}

#[tokio::test]
async fn cancel_frame_interrupts_a_running_task() {
    let agent = Arc::new(agent());
    let (conn, mut peer) = connection("ws");
    let shutdown = CancellationToken::new();

    let _session = {
        let agent = Arc::clone(&agent);
        let conn = Arc::clone(&conn);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.serve_connection(conn, &shutdown).await })
    };

    peer.push(&task_create("t-sleep", TaskType::Shell, "sleep 30"));

    // Give the subprocess a moment to start, then cancel.
    tokio::time::sleep(Duration::from_millis(200)).await;
    peer.push(
        &Message::new(
            MessageType::TaskCancel,
            &TaskCancelData {
                task_id: "t-sleep".into(),
            },
        )
        .unwrap(),
    );

    let (logs, complete) = collect_until_complete(&mut peer, "t-sleep").await;
    assert_eq!(complete.status, TaskStatus::Canceled);
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Info && l.message == "Task canceled"));

    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn heartbeats_tick_on_the_interval() {
    let agent = Arc::new(agent());
    let (conn, mut peer) = connection("ws");
    let shutdown = CancellationToken::new();

    let _session = {
        let agent = Arc::clone(&agent);
        let conn = Arc::clone(&conn);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.serve_connection(conn, &shutdown).await })
    };

    // Keep the connection's read deadline armed while time fast-forwards.
    let keepalive = {
        let stream_tx = peer.stream_tx.clone();
        tokio::spawn(async move {
            loop {
                if stream_tx.send(fc_wire::Frame::Pong(Vec::new())).is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        })
    };

    let msg = peer.next_message().await;
    assert_eq!(msg.msg_type, MessageType::AgentHeartbeat);
    let data: HeartbeatData = msg.parse_data().unwrap();
    assert_eq!(data.agent_id, "instance-1");

    keepalive.abort();
    shutdown.cancel();
}
