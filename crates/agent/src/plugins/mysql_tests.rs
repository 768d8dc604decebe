// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::{LogLevel, TaskId};

fn executor() -> MysqlExecutor {
    MysqlExecutor::new(&serde_json::Map::new())
}

fn logger_pair() -> (TaskLogger, tokio::sync::mpsc::Receiver<fc_wire::TaskLogData>) {
    TaskLogger::channel(TaskId::from_string("t1"))
}

fn verdict(stage: &str, level: i32, rows: i64, error: &str) -> GatewayVerdict {
    GatewayVerdict {
        order_id: 1,
        stage: stage.into(),
        error_level: level,
        stage_status: if level == 0 {
            "Execute Successfully".into()
        } else {
            "Audit completed".into()
        },
        error_msg: error.into(),
        sql: "UPDATE t SET a = 1".into(),
        affected_rows: rows,
        backup_dbname: String::new(),
        execute_time: "0.01".into(),
        rollback_sql: if level == 0 {
            "UPDATE t SET a = 0".into()
        } else {
            String::new()
        },
    }
}

#[tokio::test]
async fn successful_verdicts_roll_up_into_an_executed_result() {
    let exec = executor();
    let (logger, mut rx) = logger_pair();

    let response = GatewayResponse {
        error_code: 0,
        error_msg: String::new(),
        data: vec![verdict("EXECUTED", 0, 3, ""), verdict("EXECUTED", 0, 4, "")],
    };

    let result = exec.rollup(
        &response,
        "t1",
        std::time::Instant::now(),
        100,
        &logger,
    );
    assert!(result.success);
    assert_eq!(result.rows_affected, 7);
    assert_eq!(result.stage, "EXECUTED");
    assert_eq!(result.error_level, 0);
    assert!(result.rollback_sql.contains("UPDATE t SET a = 0"));
    assert!(result.text_result.contains("Order ID: 1"));

    let mut saw_rollback_line = false;
    while let Ok(line) = rx.try_recv() {
        if line.message.contains("Rollback SQL generated") {
            saw_rollback_line = true;
        }
    }
    assert!(saw_rollback_line);
}

#[tokio::test]
async fn error_verdicts_mark_the_rollup_failed() {
    let exec = executor();
    let (logger, mut rx) = logger_pair();

    let response = GatewayResponse {
        error_code: 0,
        error_msg: String::new(),
        data: vec![
            verdict("CHECKED", 0, 0, ""),
            verdict("CHECKED", 2, 0, "syntax error near 'FORM'"),
        ],
    };

    let result = exec.rollup(&response, "t1", std::time::Instant::now(), 100, &logger);
    assert!(!result.success);
    assert_eq!(result.error_level, 2);
    assert!(result.error_msg.contains("syntax error"));

    let mut saw_error_level = false;
    while let Ok(line) = rx.try_recv() {
        if line.level == LogLevel::Error {
            saw_error_level = true;
        }
    }
    assert!(saw_error_level);
}

#[tokio::test]
async fn gateway_level_errors_fail_without_verdicts() {
    let exec = executor();
    let (logger, _rx) = logger_pair();

    let response = GatewayResponse {
        error_code: 1,
        error_msg: "connection refused by backend".into(),
        data: vec![],
    };

    let result = exec.rollup(&response, "t1", std::time::Instant::now(), 100, &logger);
    assert!(!result.success);
    assert_eq!(result.error_level, 2);
    assert_eq!(result.error_msg, "connection refused by backend");
}

#[tokio::test]
async fn dangerous_sql_is_rejected_before_the_gateway() {
    let exec = executor();
    let (logger, _rx) = logger_pair();
    let req = ExecRequest::new(TaskId::new(), "DROP TABLE users");

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}

#[tokio::test]
async fn empty_sql_is_an_input_error() {
    let exec = executor();
    let (logger, _rx) = logger_pair();
    let req = ExecRequest::new(TaskId::new(), "");

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[test]
fn database_name_prefers_target_then_database_param() {
    let exec = executor();

    let mut req = ExecRequest::new(TaskId::new(), "SELECT 1");
    req.params = serde_json::json!({
        "target": { "db": "orders" },
        "database": "ignored",
    })
    .as_object()
    .unwrap()
    .clone();
    assert_eq!(exec.database_name(&req), "orders");

    req.params = serde_json::json!({ "database": "billing" })
        .as_object()
        .unwrap()
        .clone();
    assert_eq!(exec.database_name(&req), "billing");

    req.params = serde_json::Map::new();
    assert_eq!(exec.database_name(&req), "");
}

#[test]
fn gateway_url_is_trimmed_and_configurable() {
    let mut config = serde_json::Map::new();
    config.insert("goinception_url".into(), "http://gw:4000/".into());
    let exec = MysqlExecutor::new(&config);
    assert_eq!(exec.gateway_url, "http://gw:4000");
}
