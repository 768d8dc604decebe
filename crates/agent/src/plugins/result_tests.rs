// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn text_rendering_prefers_the_stored_text_result() {
    let result = ExecutionResult {
        task_id: "t1".into(),
        success: true,
        text_result: "Statement 1: SUCCESS".into(),
        ..Default::default()
    };
    assert_eq!(result.render(false), "Statement 1: SUCCESS");
}

#[test]
fn text_rendering_synthesizes_from_fields() {
    let result = ExecutionResult {
        task_id: "t1".into(),
        success: false,
        error_level: 2,
        rows_affected: 7,
        stage: "EXECUTED".into(),
        execute_time: "1.2s".into(),
        error_msg: "duplicate key".into(),
        ..Default::default()
    };
    let text = result.render(false);
    assert!(text.contains("Error: duplicate key"));
    assert!(text.contains("Affected Rows: 7"));
    assert!(text.contains("Execute Time: 1.2s"));
    assert!(text.contains("Stage: EXECUTED"));
}

#[test]
fn json_rendering_includes_the_contract_fields() {
    let result = ExecutionResult {
        task_id: "t1".into(),
        success: true,
        error_level: 0,
        rows_affected: 3,
        stage: "EXECUTED".into(),
        execute_time: "0.5s".into(),
        rollback_sql: "DELETE FROM t WHERE id = 1".into(),
        ..Default::default()
    };
    let json: serde_json::Value = serde_json::from_str(&result.render(true)).unwrap();
    assert_eq!(json["stage"], "EXECUTED");
    assert_eq!(json["error_level"], 0);
    assert_eq!(json["rows_affected"], 3);
    assert_eq!(json["execute_time"], "0.5s");
    assert_eq!(json["rollback_sql"], "DELETE FROM t WHERE id = 1");
}

#[test]
fn empty_optionals_are_omitted_from_json() {
    let result = ExecutionResult {
        task_id: "t1".into(),
        success: true,
        ..Default::default()
    };
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert!(json.get("rollback_sql").is_none());
    assert!(json.get("stage").is_none());
    assert!(json.get("rows_affected").is_none());
}
