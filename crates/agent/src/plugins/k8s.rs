// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes executor.
//!
//! Accepts YAML or JSON manifests (multiple via `---`), `Kind/Name`
//! references for `get`/`delete`/`describe`, and `Pod/name` for `logs`.
//! GVK→resource resolution goes through API discovery with a built-in
//! kind→plural table as the fallback when discovery is unavailable.
//! Conflicting writes retry with backoff.

use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use async_trait::async_trait;
use fc_core::TaskType;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::config::{
    AuthInfo, Cluster, Context, KubeConfigOptions, Kubeconfig, NamedAuthInfo, NamedCluster,
    NamedContext,
};
use kube::core::{ApiResource, GroupVersionKind};
use kube::discovery::{Discovery, Scope};
use kube::{Client, Config};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const DEFAULT_SA_TOKEN_FILE: &str = "/var/run/agent/sa/token";
const DEFAULT_SA_CA_FILE: &str = "/var/run/agent/sa/ca.crt";
const DEFAULT_KUBELET_CONFIG: &str = "/etc/kubernetes/kubelet.conf";
const CONFLICT_RETRIES: usize = 5;

pub struct K8sExecutor {
    client: RwLock<Option<Client>>,
    discovery: RwLock<Option<Discovery>>,
    settings: Settings,
}

#[derive(Debug, Clone)]
struct Settings {
    namespace: String,
    api_server: String,
    token_file: String,
    ca_file: String,
    kubelet_config: String,
}

impl K8sExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let str_of = |key: &str, default: &str| {
            config
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        Self {
            client: RwLock::new(None),
            discovery: RwLock::new(None),
            settings: Settings {
                namespace: str_of("namespace", "default"),
                api_server: normalize_host(&str_of("api_server", "")),
                token_file: str_of("token_file", DEFAULT_SA_TOKEN_FILE),
                ca_file: str_of("ca_file", DEFAULT_SA_CA_FILE),
                kubelet_config: str_of("kubelet_config", DEFAULT_KUBELET_CONFIG),
            },
        }
    }

    /// Lazily build the client: a ServiceAccount token + CA against the
    /// configured API server when available, the ambient config otherwise.
    async fn client(&self) -> Result<Client, ExecuteError> {
        if let Some(client) = self.client.read().await.clone() {
            return Ok(client);
        }

        let mut guard = self.client.write().await;
        if let Some(client) = guard.clone() {
            return Ok(client);
        }

        let mut api_server = self.settings.api_server.clone();
        if api_server.is_empty() {
            if let Some(server) = kubeconfig_server(&self.settings.kubelet_config) {
                api_server = normalize_host(&server);
            }
        }

        let config = if !api_server.is_empty()
            && std::path::Path::new(&self.settings.token_file).is_file()
        {
            let kubeconfig = Kubeconfig {
                clusters: vec![NamedCluster {
                    name: "target".into(),
                    cluster: Some(Cluster {
                        server: Some(api_server),
                        certificate_authority: Some(self.settings.ca_file.clone()),
                        ..Default::default()
                    }),
                }],
                auth_infos: vec![NamedAuthInfo {
                    name: "service-account".into(),
                    auth_info: Some(AuthInfo {
                        token_file: Some(self.settings.token_file.clone()),
                        ..Default::default()
                    }),
                }],
                contexts: vec![NamedContext {
                    name: "target".into(),
                    context: Some(Context {
                        cluster: "target".into(),
                        user: "service-account".into(),
                        namespace: Some(self.settings.namespace.clone()),
                        ..Default::default()
                    }),
                }],
                current_context: Some("target".into()),
                ..Default::default()
            };
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    ExecuteError::Service(format!("failed to build kube config: {}", e))
                })?
        } else {
            Config::infer().await.map_err(|e| {
                ExecuteError::Service(format!("kubernetes client not initialized: {}", e))
            })?
        };

        let client = Client::try_from(config)
            .map_err(|e| ExecuteError::Service(format!("failed to create kube client: {}", e)))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Resolve `(GVK) → (resource, scope)`, via discovery when reachable.
    async fn resolve(&self, client: &Client, gvk: &GroupVersionKind) -> (ApiResource, bool) {
        {
            let discovery = self.discovery.read().await;
            if let Some(discovery) = discovery.as_ref() {
                if let Some((ar, caps)) = discovery.resolve_gvk(gvk) {
                    return (ar, caps.scope == Scope::Namespaced);
                }
            }
        }

        // First use (or unknown kind): refresh the discovery cache once.
        match Discovery::new(client.clone()).run().await {
            Ok(discovery) => {
                let resolved = discovery.resolve_gvk(gvk);
                *self.discovery.write().await = Some(discovery);
                if let Some((ar, caps)) = resolved {
                    return (ar, caps.scope == Scope::Namespaced);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "API discovery unavailable; using built-in table");
            }
        }

        (
            ApiResource::from_gvk_with_plural(gvk, &pluralize_kind(&gvk.kind)),
            !is_cluster_scoped(&gvk.kind),
        )
    }

    fn namespace_for(&self, req: &ExecRequest, manifest_ns: Option<&str>) -> String {
        if let Some(ns) = req.param_str("namespace").filter(|n| !n.is_empty()) {
            return ns.to_string();
        }
        if let Some(ns) = manifest_ns.filter(|n| !n.is_empty()) {
            return ns.to_string();
        }
        self.settings.namespace.clone()
    }

    fn dynamic_api(
        &self,
        client: &Client,
        ar: &ApiResource,
        namespaced: bool,
        namespace: &str,
    ) -> Api<DynamicObject> {
        if namespaced {
            Api::namespaced_with(client.clone(), namespace, ar)
        } else {
            Api::all_with(client.clone(), ar)
        }
    }
}

#[async_trait]
impl Executor for K8sExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::K8s
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let operation = req
            .param_str("operation")
            .filter(|o| !o.is_empty())
            .unwrap_or("apply")
            .to_lowercase();

        let run = self.run_operation(req, &operation, logger);
        tokio::select! {
            outcome = run => outcome,
            _ = cancel.cancelled() => Err(ExecuteError::Canceled),
        }
    }
}

impl K8sExecutor {
    async fn run_operation(
        &self,
        req: &ExecRequest,
        operation: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        // Log and event reads take a name reference, not a manifest.
        if operation == "logs" {
            return self.pod_logs(req, logger).await;
        }
        if operation == "events" {
            return self.list_events(req, logger).await;
        }

        if req.command.is_empty() {
            return Err(ExecuteError::Input(
                "k8s YAML or JSON content is required".into(),
            ));
        }

        match detect_format(&req.command) {
            ManifestFormat::Unknown => self.process_resource_ref(req, operation, logger).await,
            format => self.process_manifests(req, format, operation, logger).await,
        }
    }

    async fn process_manifests(
        &self,
        req: &ExecRequest,
        format: ManifestFormat,
        operation: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        logger.info(format!(
            "Processing {} with operation: {}",
            format.name(),
            operation
        ));

        let manifests: Vec<&str> = req
            .command
            .split("---")
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect();

        let mut results = Vec::new();
        for (i, manifest) in manifests.iter().enumerate() {
            logger.info(format!("Processing manifest {}/{}", i + 1, manifests.len()));
            let result = self
                .process_manifest(req, manifest, format, operation, logger)
                .await
                .map_err(|e| match e {
                    ExecuteError::Failed { error, output } => ExecuteError::Failed {
                        error: format!("failed to process manifest {}: {}", i + 1, error),
                        output,
                    },
                    other => ExecuteError::Service(format!(
                        "failed to process manifest {}: {}",
                        i + 1,
                        other
                    )),
                })?;
            results.push(result);
        }
        Ok(results.join("\n\n"))
    }

    async fn process_manifest(
        &self,
        req: &ExecRequest,
        manifest: &str,
        format: ManifestFormat,
        operation: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let value: serde_json::Value = match format {
            ManifestFormat::Json => serde_json::from_str(manifest)
                .map_err(|e| ExecuteError::Input(format!("failed to decode JSON: {}", e)))?,
            _ => serde_yaml::from_str(manifest)
                .map_err(|e| ExecuteError::Input(format!("failed to decode YAML: {}", e)))?,
        };

        let gvk = gvk_of(&value)?;
        let obj: DynamicObject = serde_json::from_value(value.clone())
            .map_err(|e| ExecuteError::Input(format!("invalid manifest: {}", e)))?;
        let name = obj
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ExecuteError::Input("resource name is required".into()))?;

        let client = self.client().await?;
        let (ar, namespaced) = self.resolve(&client, &gvk).await;
        let namespace = self.namespace_for(req, obj.metadata.namespace.as_deref());
        let api = self.dynamic_api(&client, &ar, namespaced, &namespace);

        match operation {
            "create" => self.create_resource(&api, &obj, &gvk, &namespace, logger).await,
            "update" => self.update_resource(&api, obj, &gvk, &namespace, logger).await,
            "delete" => self.delete_resource(&api, &name, &gvk, &namespace, logger).await,
            "patch" => self.patch_resource(&api, &obj, &gvk, &namespace, req, logger).await,
            "apply" => self.apply_resource(&api, obj, &gvk, &namespace, logger).await,
            "get" => self.get_resource(&api, &name, req, logger).await,
            other => Err(ExecuteError::Input(format!(
                "unsupported operation: {} (supported: create, update, delete, patch, apply, get, describe, logs, events)",
                other
            ))),
        }
    }

    /// `Kind/Name` references for operations that need no manifest body.
    async fn process_resource_ref(
        &self,
        req: &ExecRequest,
        operation: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let (kind, name) = req.command.split_once('/').ok_or_else(|| {
            ExecuteError::Input("invalid resource format: expected Kind/Name (e.g. Pod/my-pod)".into())
        })?;
        if name.is_empty() {
            return Err(ExecuteError::Input("resource name is required".into()));
        }

        let gvk = resolve_gvk_by_kind(kind, req.param_str("api_version"))?;
        let client = self.client().await?;
        let (ar, namespaced) = self.resolve(&client, &gvk).await;
        let namespace = self.namespace_for(req, None);
        let api = self.dynamic_api(&client, &ar, namespaced, &namespace);

        logger.info(format!(
            "Processing {} {}/{} in namespace {}",
            operation, gvk.kind, name, namespace
        ));

        match operation {
            "get" => self.get_resource(&api, name, req, logger).await,
            "delete" => self.delete_resource(&api, name, &gvk, &namespace, logger).await,
            "describe" => {
                self.describe_resource(&api, name, &gvk, &namespace, req, logger)
                    .await
            }
            other => Err(ExecuteError::Input(format!(
                "unsupported operation for resource reference: {} (supported: get, delete, describe)",
                other
            ))),
        }
    }

    async fn create_resource(
        &self,
        api: &Api<DynamicObject>,
        obj: &DynamicObject,
        gvk: &GroupVersionKind,
        namespace: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let name = obj.metadata.name.as_deref().unwrap_or("");
        logger.info(format!("Creating {}/{} in namespace {}", gvk.kind, name, namespace));

        let created = api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to create resource: {}", e)))?;

        logger.info(format!("Successfully created {}/{}", gvk.kind, name));
        render_object(&created, "json")
    }

    async fn update_resource(
        &self,
        api: &Api<DynamicObject>,
        mut obj: DynamicObject,
        gvk: &GroupVersionKind,
        namespace: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let name = obj
            .metadata
            .name
            .clone()
            .unwrap_or_default();
        logger.info(format!("Updating {}/{} in namespace {}", gvk.kind, name, namespace));

        let mut last_err = None;
        for attempt in 0..CONFLICT_RETRIES {
            let existing = api
                .get(&name)
                .await
                .map_err(|e| ExecuteError::Service(format!("resource not found: {}", e)))?;
            obj.metadata.resource_version = existing.metadata.resource_version.clone();

            match api.replace(&name, &PostParams::default(), &obj).await {
                Ok(updated) => {
                    logger.info(format!("Successfully updated {}/{}", gvk.kind, name));
                    return render_object(&updated, "json");
                }
                Err(e) if is_conflict(&e) && attempt + 1 < CONFLICT_RETRIES => {
                    tokio::time::sleep(conflict_backoff(attempt)).await;
                    last_err = Some(e);
                }
                Err(e) => {
                    return Err(ExecuteError::Service(format!(
                        "failed to update resource: {}",
                        e
                    )))
                }
            }
        }
        Err(ExecuteError::Service(format!(
            "failed to update resource: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn delete_resource(
        &self,
        api: &Api<DynamicObject>,
        name: &str,
        gvk: &GroupVersionKind,
        namespace: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        logger.info(format!("Deleting {}/{} in namespace {}", gvk.kind, name, namespace));

        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to delete resource: {}", e)))?;

        logger.info(format!("Successfully deleted {}/{}", gvk.kind, name));
        Ok(format!("Resource {}/{} deleted successfully", gvk.kind, name))
    }

    async fn patch_resource(
        &self,
        api: &Api<DynamicObject>,
        obj: &DynamicObject,
        gvk: &GroupVersionKind,
        namespace: &str,
        req: &ExecRequest,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        logger.info(format!("Patching {}/{} in namespace {}", gvk.kind, name, namespace));

        let body = serde_json::to_value(obj)
            .map_err(|e| ExecuteError::Input(format!("failed to marshal patch data: {}", e)))?;
        let patch: Patch<serde_json::Value> = match req.param_str("patch_type").unwrap_or("strategic") {
            "json" => {
                let ops: json_patch::Patch = serde_json::from_value(body)
                    .map_err(|e| ExecuteError::Input(format!("invalid JSON patch: {}", e)))?;
                Patch::Json(ops)
            }
            "merge" => Patch::Merge(body),
            _ => Patch::Strategic(body),
        };

        let mut last_err = None;
        for attempt in 0..CONFLICT_RETRIES {
            match api.patch(&name, &PatchParams::default(), &patch).await {
                Ok(patched) => {
                    logger.info(format!("Successfully patched {}/{}", gvk.kind, name));
                    return render_object(&patched, "json");
                }
                Err(e) if is_conflict(&e) && attempt + 1 < CONFLICT_RETRIES => {
                    tokio::time::sleep(conflict_backoff(attempt)).await;
                    last_err = Some(e);
                }
                Err(e) => {
                    return Err(ExecuteError::Service(format!(
                        "failed to patch resource: {}",
                        e
                    )))
                }
            }
        }
        Err(ExecuteError::Service(format!(
            "failed to patch resource: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Get-then-create-or-update, retried on write conflicts.
    async fn apply_resource(
        &self,
        api: &Api<DynamicObject>,
        mut obj: DynamicObject,
        gvk: &GroupVersionKind,
        namespace: &str,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        logger.info(format!("Applying {}/{} in namespace {}", gvk.kind, name, namespace));

        let mut last_err = None;
        for attempt in 0..CONFLICT_RETRIES {
            let outcome = match api.get(&name).await {
                Err(_) => {
                    obj.metadata.resource_version = None;
                    api.create(&PostParams::default(), &obj).await.map(|o| {
                        logger.info(format!("Created {}/{}", gvk.kind, name));
                        o
                    })
                }
                Ok(existing) => {
                    obj.metadata.resource_version = existing.metadata.resource_version.clone();
                    api.replace(&name, &PostParams::default(), &obj).await.map(|o| {
                        logger.info(format!("Updated {}/{}", gvk.kind, name));
                        o
                    })
                }
            };

            match outcome {
                Ok(applied) => return render_object(&applied, "json"),
                Err(e) if is_conflict(&e) && attempt + 1 < CONFLICT_RETRIES => {
                    tokio::time::sleep(conflict_backoff(attempt)).await;
                    last_err = Some(e);
                }
                Err(e) => {
                    return Err(ExecuteError::Service(format!(
                        "failed to apply resource: {}",
                        e
                    )))
                }
            }
        }
        Err(ExecuteError::Service(format!(
            "failed to apply resource: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn get_resource(
        &self,
        api: &Api<DynamicObject>,
        name: &str,
        req: &ExecRequest,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let mut obj = api
            .get(name)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to get resource: {}", e)))?;

        if should_clear_managed_fields(kind_of(&obj).as_deref()) {
            obj.metadata.managed_fields = None;
        }

        logger.info(format!("Successfully retrieved {}", name));
        render_object(&obj, req.param_str("output").unwrap_or("json"))
    }

    async fn describe_resource(
        &self,
        api: &Api<DynamicObject>,
        name: &str,
        gvk: &GroupVersionKind,
        namespace: &str,
        req: &ExecRequest,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let mut obj = api
            .get(name)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to get resource: {}", e)))?;
        if should_clear_managed_fields(Some(gvk.kind.as_str())) {
            obj.metadata.managed_fields = None;
        }

        // Events keyed by object UID are exact; name/kind matching is not.
        let mut events: Vec<Event> = Vec::new();
        if let Some(uid) = obj.metadata.uid.as_deref() {
            let client = self.client().await?;
            let event_api: Api<Event> = Api::namespaced(client, namespace);
            let lp = ListParams::default()
                .fields(&format!("involvedObject.uid={}", uid));
            match event_api.list(&lp).await {
                Ok(list) => {
                    events = list.items;
                    events.sort_by_key(|e| e.last_timestamp.clone().map(|t| t.0));
                }
                Err(e) => logger.warn(format!("Failed to get events: {}", e)),
            }
        }

        let data = serde_json::json!({
            "resource": obj,
            "events": events,
        });
        render_value(&data, req.param_str("output").unwrap_or("json"))
    }

    /// Stream pod logs: `container`, `previous`, `tail_lines` (default 10).
    async fn pod_logs(&self, req: &ExecRequest, logger: &TaskLogger) -> Result<String, ExecuteError> {
        let pod_name = match req.command.split_once('/') {
            Some((kind, name)) if kind.eq_ignore_ascii_case("pod") => name,
            _ => req.command.as_str(),
        };
        if pod_name.is_empty() {
            return Err(ExecuteError::Input(
                "pod name is required for logs operation (format: \"Pod/pod-name\" or \"pod-name\")"
                    .into(),
            ));
        }

        let namespace = self.namespace_for(req, None);
        let container = req.param_str("container").map(str::to_string);
        let previous = req.param_bool("previous").unwrap_or(false);
        let tail_lines = req.param_u64("tail_lines").filter(|t| *t > 0).unwrap_or(10) as i64;

        let mut msg = format!("Getting logs for Pod {}/{}", namespace, pod_name);
        if let Some(ref container) = container {
            msg.push_str(&format!(" (container: {})", container));
        }
        if previous {
            msg.push_str(" [previous container]");
        }
        msg.push_str(&format!(", tail {} lines", tail_lines));
        logger.info(msg);

        let client = self.client().await?;
        let pods: Api<Pod> = Api::namespaced(client, &namespace);
        let params = LogParams {
            container,
            previous,
            tail_lines: Some(tail_lines),
            ..Default::default()
        };
        let logs = pods
            .logs(pod_name, &params)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to get pod logs: {}", e)))?;

        logger.info(format!(
            "Successfully retrieved logs for Pod {}/{}",
            namespace, pod_name
        ));
        Ok(logs)
    }

    /// Namespace events, optionally field-selected, sorted by lastTimestamp.
    async fn list_events(&self, req: &ExecRequest, logger: &TaskLogger) -> Result<String, ExecuteError> {
        let namespace = self.namespace_for(req, None);

        let client = self.client().await?;
        let api: Api<Event> = Api::namespaced(client, &namespace);
        let mut lp = ListParams::default();
        if let Some(selector) = req.param_str("field_selector") {
            lp = lp.fields(selector);
        }

        let mut events = api
            .list(&lp)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to list events: {}", e)))?
            .items;

        if req.param_str("sort_by").unwrap_or("lastTimestamp") == "lastTimestamp" {
            events.sort_by_key(|e| e.last_timestamp.clone().map(|t| t.0));
        }
        if let Some(limit) = req.param_u64("limit").filter(|l| *l > 0) {
            events.truncate(limit as usize);
        }

        logger.info(format!(
            "Retrieved {} events from namespace {}",
            events.len(),
            namespace
        ));
        render_value(
            &serde_json::json!({ "items": events }),
            req.param_str("output").unwrap_or("json"),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Yaml,
    Json,
    Unknown,
}

impl ManifestFormat {
    fn name(&self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Unknown => "unknown",
        }
    }
}

/// JSON if it parses as an object with apiVersion+kind; YAML if those keys
/// appear as lines; anything else is treated as a resource reference.
fn detect_format(content: &str) -> ManifestFormat {
    let content = content.trim();

    if content.starts_with('{') {
        if let Ok(obj) = serde_json::from_str::<serde_json::Value>(content) {
            if obj.get("apiVersion").is_some() && obj.get("kind").is_some() {
                return ManifestFormat::Json;
            }
        }
    }

    let has_api_version =
        content.starts_with("apiVersion:") || content.contains("\napiVersion:");
    let has_kind = content.starts_with("kind:") || content.contains("\nkind:");
    if has_api_version && has_kind {
        return ManifestFormat::Yaml;
    }

    ManifestFormat::Unknown
}

fn gvk_of(value: &serde_json::Value) -> Result<GroupVersionKind, ExecuteError> {
    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty());
    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty());
    let (Some(api_version), Some(kind)) = (api_version, kind) else {
        return Err(ExecuteError::Input(
            "manifest must contain apiVersion and kind fields".into(),
        ));
    };

    Ok(match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        },
        None => GroupVersionKind {
            group: String::new(),
            version: api_version.to_string(),
            kind: kind.to_string(),
        },
    })
}

/// GVK for a bare kind in a `Kind/Name` reference: explicit `api_version`
/// wins, then the well-known kinds table.
fn resolve_gvk_by_kind(
    kind: &str,
    api_version: Option<&str>,
) -> Result<GroupVersionKind, ExecuteError> {
    if let Some(api_version) = api_version.filter(|v| !v.is_empty()) {
        return Ok(match api_version.split_once('/') {
            Some((group, version)) => GroupVersionKind {
                group: group.to_string(),
                version: version.to_string(),
                kind: kind.to_string(),
            },
            None => GroupVersionKind {
                group: String::new(),
                version: api_version.to_string(),
                kind: kind.to_string(),
            },
        });
    }

    let gvk = |group: &str, version: &str, kind: &str| GroupVersionKind {
        group: group.to_string(),
        version: version.to_string(),
        kind: kind.to_string(),
    };

    Ok(match kind.to_ascii_lowercase().as_str() {
        "pod" | "pods" | "po" => gvk("", "v1", "Pod"),
        "service" | "services" | "svc" => gvk("", "v1", "Service"),
        "configmap" | "configmaps" | "cm" => gvk("", "v1", "ConfigMap"),
        "secret" | "secrets" => gvk("", "v1", "Secret"),
        "namespace" | "namespaces" | "ns" => gvk("", "v1", "Namespace"),
        "node" | "nodes" | "no" => gvk("", "v1", "Node"),
        "persistentvolume" | "persistentvolumes" | "pv" => gvk("", "v1", "PersistentVolume"),
        "persistentvolumeclaim" | "persistentvolumeclaims" | "pvc" => {
            gvk("", "v1", "PersistentVolumeClaim")
        }
        "serviceaccount" | "serviceaccounts" | "sa" => gvk("", "v1", "ServiceAccount"),
        "deployment" | "deployments" | "deploy" => gvk("apps", "v1", "Deployment"),
        "statefulset" | "statefulsets" | "sts" => gvk("apps", "v1", "StatefulSet"),
        "daemonset" | "daemonsets" | "ds" => gvk("apps", "v1", "DaemonSet"),
        "replicaset" | "replicasets" | "rs" => gvk("apps", "v1", "ReplicaSet"),
        "job" | "jobs" => gvk("batch", "v1", "Job"),
        "cronjob" | "cronjobs" | "cj" => gvk("batch", "v1", "CronJob"),
        "ingress" | "ingresses" | "ing" => gvk("networking.k8s.io", "v1", "Ingress"),
        _ => {
            return Err(ExecuteError::Input(format!(
                "cannot resolve kind '{}', please specify 'api_version' in params",
                kind
            )))
        }
    })
}

/// Kind → plural resource name, for when discovery is unavailable.
fn pluralize_kind(kind: &str) -> String {
    let kind = kind.to_ascii_lowercase();

    let table: &[(&str, &str)] = &[
        ("endpoints", "endpoints"),
        ("endpoint", "endpoints"),
        ("ingress", "ingresses"),
        ("networkpolicy", "networkpolicies"),
        ("storageclass", "storageclasses"),
        ("customresourcedefinition", "customresourcedefinitions"),
        ("crd", "customresourcedefinitions"),
    ];
    if let Some((_, plural)) = table.iter().find(|(k, _)| *k == kind) {
        return plural.to_string();
    }

    if let Some(stem) = kind.strip_suffix('y') {
        return format!("{stem}ies");
    }
    if kind.ends_with('s')
        || kind.ends_with('x')
        || kind.ends_with('z')
        || kind.ends_with("ch")
        || kind.ends_with("sh")
    {
        return format!("{kind}es");
    }
    format!("{kind}s")
}

fn is_cluster_scoped(kind: &str) -> bool {
    matches!(
        kind.to_ascii_lowercase().as_str(),
        "namespace"
            | "node"
            | "persistentvolume"
            | "clusterrole"
            | "clusterrolebinding"
            | "storageclass"
            | "customresourcedefinition"
    )
}

fn should_clear_managed_fields(kind: Option<&str>) -> bool {
    matches!(
        kind.map(|k| k.to_ascii_lowercase()).as_deref(),
        Some("pod") | Some("node")
    )
}

fn kind_of(obj: &DynamicObject) -> Option<String> {
    obj.types.as_ref().map(|t| t.kind.clone())
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

fn conflict_backoff(attempt: usize) -> Duration {
    Duration::from_millis(100 * (attempt as u64 + 1))
}

fn render_object(obj: &DynamicObject, output: &str) -> Result<String, ExecuteError> {
    let value = serde_json::to_value(obj)
        .map_err(|e| ExecuteError::Service(format!("failed to render resource: {}", e)))?;
    render_value(&value, output)
}

fn render_value(value: &serde_json::Value, output: &str) -> Result<String, ExecuteError> {
    if output.eq_ignore_ascii_case("yaml") {
        serde_yaml::to_string(value)
            .map_err(|e| ExecuteError::Service(format!("failed to marshal result to YAML: {}", e)))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| ExecuteError::Service(format!("failed to marshal result to JSON: {}", e)))
    }
}

/// Extract the API server URL from a kubeconfig-style file (e.g. the
/// kubelet's); the current context's cluster wins, any cluster otherwise.
fn kubeconfig_server(path: &str) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    let value: serde_yaml::Value = serde_yaml::from_str(&data).ok()?;

    let clusters = value.get("clusters")?.as_sequence()?;

    if let Some(current) = value.get("current-context").and_then(|v| v.as_str()) {
        let contexts = value.get("contexts").and_then(|v| v.as_sequence());
        let cluster_name = contexts.and_then(|cs| {
            cs.iter()
                .find(|c| c.get("name").and_then(|n| n.as_str()) == Some(current))
                .and_then(|c| c.get("context")?.get("cluster")?.as_str())
        });
        if let Some(cluster_name) = cluster_name {
            for cluster in clusters {
                if cluster.get("name").and_then(|n| n.as_str()) == Some(cluster_name) {
                    if let Some(server) = cluster.get("cluster")?.get("server")?.as_str() {
                        return Some(server.to_string());
                    }
                }
            }
        }
    }

    clusters.iter().find_map(|c| {
        c.get("cluster")?
            .get("server")?
            .as_str()
            .map(str::to_string)
    })
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').trim().to_string()
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod tests;
