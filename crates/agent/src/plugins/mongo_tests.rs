// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::TaskId;

#[test]
fn connection_uri_variants() {
    let bare = serde_json::json!({});
    assert_eq!(
        MongoExecutor::connection_uri(bare.as_object().unwrap()),
        "mongodb://localhost:27017"
    );

    let full = serde_json::json!({
        "host": "mongo.internal",
        "port": 27018,
        "user": "app",
        "password": "pw",
        "database": "orders",
    });
    assert_eq!(
        MongoExecutor::connection_uri(full.as_object().unwrap()),
        "mongodb://app:pw@mongo.internal:27018/orders"
    );
}

#[test]
fn database_name_prefers_db_then_database_then_admin() {
    let both = serde_json::json!({ "db": "primary", "database": "secondary" });
    assert_eq!(
        MongoExecutor::database_name(both.as_object().unwrap()),
        "primary"
    );

    let database_only = serde_json::json!({ "database": "secondary" });
    assert_eq!(
        MongoExecutor::database_name(database_only.as_object().unwrap()),
        "secondary"
    );

    let none = serde_json::json!({});
    assert_eq!(MongoExecutor::database_name(none.as_object().unwrap()), "admin");
}

#[test]
fn operations_parse_as_array_or_single_object() {
    let array = parse_operations(r#"[{"operation":"find","collection":"a"}]"#).unwrap();
    assert_eq!(array.len(), 1);

    let single = parse_operations(r#"{"operation":"insert","collection":"a"}"#).unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0]["operation"], "insert");

    assert!(parse_operations("db.users.find()").is_err());
}

#[tokio::test]
async fn empty_command_is_an_input_error() {
    let exec = MongoExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(TaskId::new(), "");

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn where_injection_is_rejected_before_any_connection() {
    let exec = MongoExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    // No target params at all: the validator must fire first.
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"find","collection":"users","filter":{"$where":"1"}}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}

#[tokio::test]
async fn disallowed_operation_is_rejected() {
    let exec = MongoExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"drop","collection":"users"}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}

#[tokio::test]
async fn traversal_collection_name_is_rejected() {
    let exec = MongoExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(
        TaskId::new(),
        r#"{"operation":"find","collection":"../system"}"#,
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Policy(_)));
}
