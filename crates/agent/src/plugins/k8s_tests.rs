// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn json_manifests_are_detected() {
    let manifest = r#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p"}}"#;
    assert_eq!(detect_format(manifest), ManifestFormat::Json);
}

#[test]
fn yaml_manifests_are_detected() {
    let manifest = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web";
    assert_eq!(detect_format(manifest), ManifestFormat::Yaml);

    let indented = "# comment\napiVersion: v1\nkind: ConfigMap";
    assert_eq!(detect_format(indented), ManifestFormat::Yaml);
}

#[test]
fn resource_references_are_unknown_format() {
    assert_eq!(detect_format("Pod/my-pod"), ManifestFormat::Unknown);
    assert_eq!(detect_format("Deployment/web"), ManifestFormat::Unknown);
    assert_eq!(detect_format(r#"{"no":"gvk"}"#), ManifestFormat::Unknown);
}

#[test]
fn gvk_parses_grouped_and_core_api_versions() {
    let grouped = serde_json::json!({"apiVersion": "apps/v1", "kind": "Deployment"});
    let gvk = gvk_of(&grouped).unwrap();
    assert_eq!(gvk.group, "apps");
    assert_eq!(gvk.version, "v1");
    assert_eq!(gvk.kind, "Deployment");

    let core = serde_json::json!({"apiVersion": "v1", "kind": "Pod"});
    let gvk = gvk_of(&core).unwrap();
    assert_eq!(gvk.group, "");
    assert_eq!(gvk.version, "v1");

    let missing = serde_json::json!({"kind": "Pod"});
    assert!(gvk_of(&missing).is_err());
}

#[test]
fn kind_table_resolves_aliases() {
    let pod = resolve_gvk_by_kind("po", None).unwrap();
    assert_eq!(pod.kind, "Pod");
    assert_eq!(pod.version, "v1");

    let deploy = resolve_gvk_by_kind("deploy", None).unwrap();
    assert_eq!(deploy.group, "apps");
    assert_eq!(deploy.kind, "Deployment");

    let ing = resolve_gvk_by_kind("ing", None).unwrap();
    assert_eq!(ing.group, "networking.k8s.io");

    assert!(resolve_gvk_by_kind("widget", None).is_err());
}

#[test]
fn explicit_api_version_overrides_the_table() {
    let custom = resolve_gvk_by_kind("Widget", Some("example.com/v1alpha1")).unwrap();
    assert_eq!(custom.group, "example.com");
    assert_eq!(custom.version, "v1alpha1");
    assert_eq!(custom.kind, "Widget");
}

#[test]
fn pluralize_covers_irregulars_and_suffix_rules() {
    assert_eq!(pluralize_kind("Pod"), "pods");
    assert_eq!(pluralize_kind("Deployment"), "deployments");
    assert_eq!(pluralize_kind("Ingress"), "ingresses");
    assert_eq!(pluralize_kind("NetworkPolicy"), "networkpolicies");
    assert_eq!(pluralize_kind("Endpoints"), "endpoints");
    assert_eq!(pluralize_kind("StorageClass"), "storageclasses");
    assert_eq!(pluralize_kind("CRD"), "customresourcedefinitions");
}

#[test]
fn cluster_scoped_kinds_are_known() {
    assert!(is_cluster_scoped("Namespace"));
    assert!(is_cluster_scoped("node"));
    assert!(is_cluster_scoped("ClusterRoleBinding"));
    assert!(!is_cluster_scoped("Pod"));
    assert!(!is_cluster_scoped("Deployment"));
}

#[test]
fn managed_fields_are_cleared_for_pods_and_nodes_only() {
    assert!(should_clear_managed_fields(Some("Pod")));
    assert!(should_clear_managed_fields(Some("node")));
    assert!(!should_clear_managed_fields(Some("Deployment")));
    assert!(!should_clear_managed_fields(None));
}

#[test]
fn host_normalization_strips_quotes_and_whitespace() {
    assert_eq!(normalize_host("  https://1.2.3.4:6443  "), "https://1.2.3.4:6443");
    assert_eq!(normalize_host("\"https://api\""), "https://api");
    assert_eq!(normalize_host("`https://api`"), "https://api");
}

#[test]
fn kubeconfig_server_prefers_the_current_context() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kubelet.conf");
    std::fs::write(
        &path,
        r#"apiVersion: v1
kind: Config
current-context: two
clusters:
- name: one
  cluster:
    server: https://one:6443
- name: two
  cluster:
    server: https://two:6443
contexts:
- name: two
  context:
    cluster: two
    user: kubelet
"#,
    )
    .unwrap();

    assert_eq!(
        kubeconfig_server(path.to_str().unwrap()),
        Some("https://two:6443".to_string())
    );
}

#[test]
fn kubeconfig_server_falls_back_to_any_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kubelet.conf");
    std::fs::write(
        &path,
        "clusters:\n- name: only\n  cluster:\n    server: https://only:6443\n",
    )
    .unwrap();
    assert_eq!(
        kubeconfig_server(path.to_str().unwrap()),
        Some("https://only:6443".to_string())
    );
    assert_eq!(kubeconfig_server("/missing/file"), None);
}

#[tokio::test]
async fn manifest_operations_require_content() {
    let exec = K8sExecutor::new(&serde_json::Map::new());
    let (logger, _rx) = crate::logger::TaskLogger::channel(fc_core::TaskId::from_string("t1"));
    let req = ExecRequest::new(fc_core::TaskId::new(), "");

    let err = exec
        .execute(&req, &logger, &tokio_util::sync::CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}
