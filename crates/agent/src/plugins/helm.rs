// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helm executor: drives the `helm` binary for release operations.
//!
//! `KUBECONFIG` and `HELM_DRIVER` pass through from the agent's
//! environment. Inline values are written to a temp file and passed with
//! `-f`; charts come from an uploaded archive (`file_path`) or a repository
//! (`repository` + `chart`).

use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use async_trait::async_trait;
use fc_core::TaskType;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HELM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Structured parameters for a helm operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelmParams {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub release_name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub chart_file_id: String,
    #[serde(default)]
    pub repository: Option<HelmRepository>,
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub values: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub flags: Option<HelmFlags>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelmRepository {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelmFlags {
    #[serde(default)]
    pub create_namespace: bool,
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub dry_run: bool,
}

pub struct HelmExecutor {
    binary: String,
}

impl HelmExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let binary = config
            .get("binary")
            .and_then(|v| v.as_str())
            .filter(|b| !b.is_empty())
            .unwrap_or("helm")
            .to_string();
        Self { binary }
    }

    /// Chart source: an uploaded archive path wins over a repository chart.
    fn chart_source(params: &HelmParams, file_path: Option<&str>) -> Result<String, ExecuteError> {
        if let Some(path) = file_path.filter(|p| !p.is_empty()) {
            return Ok(path.to_string());
        }
        if params.repository.is_some() && !params.chart.is_empty() {
            return Ok(params.chart.clone());
        }
        Err(ExecuteError::Input(
            "either an uploaded chart file or repository configuration is required".into(),
        ))
    }

    fn install_args(
        params: &HelmParams,
        namespace: &str,
        chart: &str,
        values_file: Option<&str>,
        upgrade: bool,
    ) -> Vec<String> {
        let mut args = vec![
            if upgrade { "upgrade" } else { "install" }.to_string(),
            params.release_name.clone(),
            chart.to_string(),
            "--namespace".into(),
            namespace.to_string(),
        ];

        if let Some(repo) = &params.repository {
            args.push("--repo".into());
            args.push(repo.url.clone());
            if !repo.username.is_empty() {
                args.push("--username".into());
                args.push(repo.username.clone());
                args.push("--password".into());
                args.push(repo.password.clone());
            }
        }
        if !params.version.is_empty() {
            args.push("--version".into());
            args.push(params.version.clone());
        }
        if let Some(values_file) = values_file {
            args.push("-f".into());
            args.push(values_file.to_string());
        }
        if let Some(flags) = &params.flags {
            if flags.create_namespace && !upgrade {
                args.push("--create-namespace".into());
            }
            if flags.wait {
                args.push("--wait".into());
            }
            if !flags.timeout.is_empty() {
                args.push("--timeout".into());
                args.push(flags.timeout.clone());
            }
            if flags.force && upgrade {
                args.push("--force".into());
            }
            if flags.dry_run {
                args.push("--dry-run".into());
            }
        }
        args
    }

    async fn run_helm(
        &self,
        args: &[String],
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        tracing::debug!(binary = %self.binary, ?args, "running helm");

        let mut child = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecuteError::Service(format!("failed to start helm: {}", e)))?;

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| ExecuteError::Service(format!("helm failed: {}", e)))?
            }
            _ = cancel.cancelled() => {
                logger.warn("Helm operation canceled");
                return Err(ExecuteError::Canceled);
            }
            _ = tokio::time::sleep(HELM_TIMEOUT) => return Err(ExecuteError::Timeout),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ExecuteError::Failed {
                error: format!(
                    "helm {} failed: {}",
                    args.first().map(String::as_str).unwrap_or(""),
                    stderr.trim()
                ),
                output: stdout,
            });
        }
        Ok(stdout)
    }

    async fn write_values_file(
        values: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<tempfile::NamedTempFile, ExecuteError> {
        let rendered = serde_yaml::to_string(values)
            .map_err(|e| ExecuteError::Input(format!("failed to render values: {}", e)))?;
        let file = tempfile::Builder::new()
            .prefix("helm-values-")
            .suffix(".yaml")
            .tempfile()
            .map_err(|e| ExecuteError::Service(format!("failed to create values file: {}", e)))?;
        tokio::fs::write(file.path(), rendered)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to write values file: {}", e)))?;
        Ok(file)
    }
}

#[async_trait]
impl Executor for HelmExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Helm
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let params: HelmParams =
            serde_json::from_value(serde_json::Value::Object(req.params.clone()))
                .map_err(|e| ExecuteError::Input(format!("failed to parse helm params: {}", e)))?;

        let namespace = if params.namespace.is_empty() {
            "default".to_string()
        } else {
            params.namespace.clone()
        };

        logger.info(format!("Starting Helm operation: {}", params.operation));

        match params.operation.as_str() {
            "install" | "upgrade" => {
                if params.release_name.is_empty() {
                    return Err(ExecuteError::Input(format!(
                        "release_name is required for {} operation",
                        params.operation
                    )));
                }
                let upgrade = params.operation == "upgrade";
                let chart = Self::chart_source(&params, req.param_str("file_path"))?;

                let values_file = match &params.values {
                    Some(values) if !values.is_empty() => Some(Self::write_values_file(values).await?),
                    _ => None,
                };
                let values_path = values_file
                    .as_ref()
                    .map(|f| f.path().to_string_lossy().into_owned());

                logger.info(format!(
                    "{} release: {} in namespace: {} (chart: {})",
                    if upgrade { "Upgrading" } else { "Installing" },
                    params.release_name,
                    namespace,
                    chart
                ));

                let args = Self::install_args(
                    &params,
                    &namespace,
                    &chart,
                    values_path.as_deref(),
                    upgrade,
                );
                let output = self.run_helm(&args, logger, cancel).await?;

                let result = format!(
                    "Successfully {} release: {}\n{}",
                    if upgrade { "upgraded" } else { "installed" },
                    params.release_name,
                    output.trim()
                );
                logger.info(result.clone());
                Ok(result)
            }
            "list" => {
                logger.info(format!("Listing releases in namespace: {}", namespace));
                let args = vec![
                    "list".to_string(),
                    "--all".into(),
                    "--namespace".into(),
                    namespace.clone(),
                    "--output".into(),
                    "json".into(),
                ];
                let output = self.run_helm(&args, logger, cancel).await?;
                let trimmed = output.trim();
                if trimmed.is_empty() || trimmed == "[]" {
                    let result = format!("No releases found in namespace: {}", namespace);
                    logger.info(result.clone());
                    return Ok(result);
                }
                Ok(output)
            }
            "delete" | "uninstall" => {
                if params.release_name.is_empty() {
                    return Err(ExecuteError::Input(
                        "release_name is required for delete operation".into(),
                    ));
                }
                logger.info(format!(
                    "Deleting release: {} from namespace: {}",
                    params.release_name, namespace
                ));
                let mut args = vec![
                    "uninstall".to_string(),
                    params.release_name.clone(),
                    "--namespace".into(),
                    namespace,
                ];
                if let Some(flags) = &params.flags {
                    if !flags.timeout.is_empty() {
                        args.push("--timeout".into());
                        args.push(flags.timeout.clone());
                    }
                    if flags.dry_run {
                        args.push("--dry-run".into());
                    }
                }
                let output = self.run_helm(&args, logger, cancel).await?;
                let result = format!(
                    "Successfully deleted release: {}, info: {}",
                    params.release_name,
                    output.trim()
                );
                logger.info(result.clone());
                Ok(result)
            }
            "get-values" => {
                if params.release_name.is_empty() {
                    return Err(ExecuteError::Input(
                        "release_name is required for get-values operation".into(),
                    ));
                }
                logger.info(format!(
                    "Getting values for release: {} in namespace: {}",
                    params.release_name, namespace
                ));
                let args = vec![
                    "get".to_string(),
                    "values".into(),
                    params.release_name.clone(),
                    "--namespace".into(),
                    namespace,
                    "--all".into(),
                    "--output".into(),
                    "json".into(),
                ];
                let output = self.run_helm(&args, logger, cancel).await?;
                Ok(format!(
                    "Values for release {}:\n{}",
                    params.release_name,
                    output.trim()
                ))
            }
            other => Err(ExecuteError::Input(format!(
                "unsupported helm operation: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
#[path = "helm_tests.rs"]
mod tests;
