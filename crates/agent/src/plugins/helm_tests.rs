// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::TaskId;

fn params(json: serde_json::Value) -> HelmParams {
    serde_json::from_value(json).unwrap()
}

#[test]
fn chart_source_prefers_uploaded_archives() {
    let p = params(serde_json::json!({
        "operation": "install",
        "release_name": "web",
        "repository": { "url": "https://charts.example.com" },
        "chart": "nginx",
    }));
    assert_eq!(
        HelmExecutor::chart_source(&p, Some("/data/files/web-1.0.0.tgz")).unwrap(),
        "/data/files/web-1.0.0.tgz"
    );
    assert_eq!(HelmExecutor::chart_source(&p, None).unwrap(), "nginx");
}

#[test]
fn chart_source_requires_some_origin() {
    let p = params(serde_json::json!({ "operation": "install", "release_name": "web" }));
    assert!(matches!(
        HelmExecutor::chart_source(&p, None),
        Err(ExecuteError::Input(_))
    ));
}

#[test]
fn install_args_include_repo_and_flags() {
    let p = params(serde_json::json!({
        "operation": "install",
        "release_name": "web",
        "repository": {
            "url": "https://charts.example.com",
            "username": "u",
            "password": "p",
        },
        "chart": "nginx",
        "version": "1.2.3",
        "flags": {
            "create_namespace": true,
            "wait": true,
            "timeout": "5m",
            "dry_run": true,
        },
    }));

    let args = HelmExecutor::install_args(&p, "edge", "nginx", Some("/tmp/values.yaml"), false);
    let joined = args.join(" ");
    assert!(joined.starts_with("install web nginx --namespace edge"));
    assert!(joined.contains("--repo https://charts.example.com"));
    assert!(joined.contains("--username u --password p"));
    assert!(joined.contains("--version 1.2.3"));
    assert!(joined.contains("-f /tmp/values.yaml"));
    assert!(joined.contains("--create-namespace"));
    assert!(joined.contains("--wait"));
    assert!(joined.contains("--timeout 5m"));
    assert!(joined.contains("--dry-run"));
}

#[test]
fn upgrade_args_swap_create_namespace_for_force() {
    let p = params(serde_json::json!({
        "operation": "upgrade",
        "release_name": "web",
        "chart": "nginx",
        "repository": { "url": "https://charts.example.com" },
        "flags": { "create_namespace": true, "force": true },
    }));

    let args = HelmExecutor::install_args(&p, "default", "nginx", None, true);
    let joined = args.join(" ");
    assert!(joined.starts_with("upgrade web nginx"));
    assert!(joined.contains("--force"));
    assert!(!joined.contains("--create-namespace"));
}

#[tokio::test]
async fn unsupported_operation_is_an_input_error() {
    let exec = HelmExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = crate::logger::TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(TaskId::new(), "").with_params(
        serde_json::json!({ "operation": "rollback" })
            .as_object()
            .unwrap()
            .clone(),
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn install_without_release_name_is_an_input_error() {
    let exec = HelmExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = crate::logger::TaskLogger::channel(TaskId::from_string("t1"));
    let req = ExecRequest::new(TaskId::new(), "").with_params(
        serde_json::json!({ "operation": "install", "chart": "nginx" })
            .as_object()
            .unwrap()
            .clone(),
    );

    let err = exec
        .execute(&req, &logger, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}
