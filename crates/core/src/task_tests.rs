// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn type_serde_uses_lowercase_tags() {
    assert_eq!(serde_json::to_string(&TaskType::Shell).unwrap(), "\"shell\"");
    assert_eq!(serde_json::to_string(&TaskType::K8s).unwrap(), "\"k8s\"");
    let t: TaskType = serde_json::from_str("\"elasticsearch\"").unwrap();
    assert_eq!(t, TaskType::Elasticsearch);
}

#[test]
fn sql_alias_normalizes_to_mysql() {
    let t: TaskType = serde_json::from_str("\"sql\"").unwrap();
    assert_eq!(t, TaskType::Sql);
    assert_eq!(t.normalize(), TaskType::Mysql);
    assert_eq!(TaskType::Shell.normalize(), TaskType::Shell);
}

#[test]
fn from_str_accepts_common_aliases() {
    assert_eq!("postgresql".parse::<TaskType>().unwrap(), TaskType::Postgres);
    assert_eq!("mongodb".parse::<TaskType>().unwrap(), TaskType::Mongo);
    assert!("redis".parse::<TaskType>().is_err());
}

#[test]
fn pending_can_reach_every_other_state() {
    let p = TaskStatus::Pending;
    assert!(p.can_transition_to(TaskStatus::Running));
    assert!(p.can_transition_to(TaskStatus::Failed));
    assert!(p.can_transition_to(TaskStatus::Canceled));
    assert!(p.can_transition_to(TaskStatus::Success));
}

#[test]
fn running_only_reaches_terminal_states() {
    let r = TaskStatus::Running;
    assert!(r.can_transition_to(TaskStatus::Success));
    assert!(r.can_transition_to(TaskStatus::Failed));
    assert!(r.can_transition_to(TaskStatus::Canceled));
    assert!(!r.can_transition_to(TaskStatus::Pending));
    assert!(!r.can_transition_to(TaskStatus::Running));
}

#[test]
fn terminal_states_are_frozen() {
    for terminal in [
        TaskStatus::Success,
        TaskStatus::Failed,
        TaskStatus::Canceled,
    ] {
        assert!(terminal.is_terminal());
        for next in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Success,
            TaskStatus::Failed,
            TaskStatus::Canceled,
        ] {
            assert!(
                !terminal.can_transition_to(next),
                "{terminal} must not move to {next}"
            );
        }
    }
}

#[test]
fn task_serializes_type_under_wire_name() {
    let task = Task {
        id: TaskId::from_string("t1"),
        agent_id: "prod-node-1".to_string(),
        task_type: TaskType::Shell,
        status: TaskStatus::Pending,
        command: "echo hi".to_string(),
        params: None,
        file_id: None,
        result: String::new(),
        error: String::new(),
        started_at_ms: None,
        finished_at_ms: None,
        created_at_ms: 1,
        updated_at_ms: 1,
    };
    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["type"], "shell");
    assert_eq!(json["status"], "pending");
    assert!(json.get("file_id").is_none());
}
