// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::TaskId;

fn executor() -> ElasticsearchExecutor {
    ElasticsearchExecutor::new(&serde_json::Map::new())
}

#[test]
fn target_defaults_to_local_9200() {
    let target = ElasticsearchExecutor::target_from(&serde_json::Map::new());
    assert_eq!(target.base_url, "http://localhost:9200");
    assert!(target.user.is_empty());
}

#[test]
fn target_reads_credentials() {
    let params = serde_json::json!({
        "host": "es.internal",
        "port": 9201,
        "user": "writer",
        "password": "pw",
        "api_key": "key123",
    });
    let target = ElasticsearchExecutor::target_from(params.as_object().unwrap());
    assert_eq!(target.base_url, "http://es.internal:9201");
    assert_eq!(target.user, "writer");
    assert_eq!(target.api_key, "key123");
}

#[tokio::test]
async fn invalid_json_is_an_input_error() {
    let exec = executor();
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(TaskId::new(), "not json");

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn invalid_index_name_is_a_policy_error() {
    let exec = executor();
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"bulk","index":"../secrets","actions":[]}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}

#[tokio::test]
async fn unsupported_operation_is_a_policy_error() {
    let exec = executor();
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"reindex","index":"logs"}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}

#[tokio::test]
async fn missing_index_is_an_input_error() {
    let exec = executor();
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(TaskId::new(), r#"{"operation":"bulk","actions":[]}"#);

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn missing_target_is_an_input_error() {
    let exec = executor();
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"index","index":"logs","doc":{"a":1}}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}
