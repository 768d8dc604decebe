// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin configuration: which executors to assemble and their limits.

use crate::executor::{ExecutorManager, ManagerConfig};
use crate::plugins;
use fc_core::TaskType;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// One plugin entry in the YAML config.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginDefinition {
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// Full agent plugin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugins: Vec<PluginDefinition>,
    /// Global concurrency cap; 0 disables the gate
    #[serde(default)]
    pub max_concurrency: usize,
    /// Per-type concurrency caps
    #[serde(default)]
    pub type_concurrency: HashMap<String, usize>,
}

impl Default for PluginConfig {
    /// The minimal set used when no config file exists.
    fn default() -> Self {
        let entry = |ty: &str| PluginDefinition {
            plugin_type: ty.to_string(),
            enabled: true,
            config: serde_json::Map::new(),
        };
        Self {
            plugins: vec![entry("shell"), entry("file"), entry("api"), entry("helm")],
            max_concurrency: 0,
            type_concurrency: HashMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginConfigError {
    #[error("failed to read plugin config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse plugin config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown plugin type: {0}")]
    UnknownType(String),

    #[error("failed to create {plugin} executor: {reason}")]
    Construct { plugin: String, reason: String },
}

impl PluginConfig {
    /// Load from a YAML file; a missing file yields the default set.
    pub fn load(path: &str) -> Result<Self, PluginConfigError> {
        if path.is_empty() || !Path::new(path).exists() {
            tracing::info!(path, "plugin config not found, using default executor set");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&data)?;
        tracing::info!(path, plugins = config.plugins.len(), "loaded plugin config");
        Ok(config)
    }

    fn manager_config(&self) -> ManagerConfig {
        let type_concurrency = self
            .type_concurrency
            .iter()
            .filter_map(|(ty, limit)| TaskType::from_str(ty).ok().map(|t| (t.normalize(), *limit)))
            .collect();
        ManagerConfig {
            max_concurrency: self.max_concurrency,
            type_concurrency,
        }
    }
}

/// Assemble the executor manager from config: construct each enabled
/// plugin and register it under its type tag.
pub fn build_manager(
    agent_id: &str,
    config: &PluginConfig,
    security_config_path: &str,
) -> Result<ExecutorManager, PluginConfigError> {
    let mut manager = ExecutorManager::new(config.manager_config());

    for def in &config.plugins {
        if !def.enabled {
            tracing::info!(plugin = %def.plugin_type, "plugin disabled, skipping");
            continue;
        }

        let ty = TaskType::from_str(&def.plugin_type)
            .map_err(|_| PluginConfigError::UnknownType(def.plugin_type.clone()))?
            .normalize();

        let executor: Arc<dyn plugins::Executor> = match ty {
            TaskType::Shell => Arc::new(
                plugins::shell::ShellExecutor::new(agent_id, security_config_path).map_err(
                    |e| PluginConfigError::Construct {
                        plugin: "shell".into(),
                        reason: e.to_string(),
                    },
                )?,
            ),
            TaskType::Mysql => Arc::new(plugins::mysql::MysqlExecutor::new(&def.config)),
            TaskType::Postgres => Arc::new(plugins::postgres::PostgresExecutor::new(&def.config)),
            TaskType::Clickhouse => {
                Arc::new(plugins::clickhouse::ClickhouseExecutor::new(&def.config))
            }
            TaskType::Mongo => Arc::new(plugins::mongo::MongoExecutor::new(&def.config)),
            TaskType::Elasticsearch => {
                Arc::new(plugins::elasticsearch::ElasticsearchExecutor::new(&def.config))
            }
            TaskType::K8s => Arc::new(plugins::k8s::K8sExecutor::new(&def.config)),
            TaskType::Helm => Arc::new(plugins::helm::HelmExecutor::new(&def.config)),
            TaskType::Api => Arc::new(plugins::api::ApiExecutor::new(&def.config)),
            TaskType::File => Arc::new(plugins::file::FileExecutor::new(&def.config)),
            TaskType::Sql => unreachable!("normalized above"),
        };
        manager.register_executor(executor);
    }

    Ok(manager)
}

/// Resolve a config path: explicit env var, then the conventional location.
pub fn config_path_from_env(env_var: &str, conventional: &str) -> String {
    if let Ok(path) = std::env::var(env_var) {
        if !path.is_empty() {
            return path;
        }
    }
    if Path::new(conventional).exists() {
        return conventional.to_string();
    }
    if let Ok(wd) = std::env::current_dir() {
        let candidate = wd.join(conventional);
        if candidate.exists() {
            return candidate.to_string_lossy().into_owned();
        }
    }
    String::new()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
