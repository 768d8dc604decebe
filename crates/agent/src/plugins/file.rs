// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File executor: copy/distribute/delete/create against a base-path
//! sandbox. Every target path resolves inside the configured base path.

use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use async_trait::async_trait;
use fc_core::TaskType;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub struct FileExecutor {
    base_path: PathBuf,
}

impl FileExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let base_path = config
            .get("base_path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("tmp")
            });
        let _ = std::fs::create_dir_all(&base_path);
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a requested target inside the sandbox. Absolute paths under
    /// the base pass through; anything else is joined below it. Traversal
    /// components are rejected.
    fn resolve_target(&self, target: &str) -> Result<PathBuf, ExecuteError> {
        if target.is_empty() {
            return Ok(self.base_path.clone());
        }
        let requested = Path::new(target);
        if requested
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ExecuteError::Policy(format!(
                "target path escapes the sandbox: {}",
                target
            )));
        }

        let resolved = if requested.starts_with(&self.base_path) {
            requested.to_path_buf()
        } else {
            let relative = requested.strip_prefix("/").unwrap_or(requested);
            self.base_path.join(relative)
        };
        Ok(resolved)
    }
}

#[async_trait]
impl Executor for FileExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::File
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        _cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let operation = req.param_str("operation").unwrap_or("copy");
        let target = self.resolve_target(req.param_str("target_path").unwrap_or(""))?;

        match operation {
            "copy" | "distribute" => self.copy_file(req, target, logger).await,
            "delete" => self.delete_file(target, logger).await,
            "create" => self.create_file(req, target, logger).await,
            other => Err(ExecuteError::Input(format!(
                "unknown file operation: {}",
                other
            ))),
        }
    }
}

impl FileExecutor {
    async fn copy_file(
        &self,
        req: &ExecRequest,
        mut target: PathBuf,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        let source = req
            .param_str("file_path")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ExecuteError::Input("file_path is required for copy operation".into()))?;

        logger.info(format!("Copying file {} to {}", source, target.display()));

        let source_name = req
            .param_str("file_name")
            .filter(|n| !n.is_empty())
            .map(sanitize_name)
            .or_else(|| {
                Path::new(source)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "file".to_string());

        // A directory target receives the source file name.
        let is_dir = tokio::fs::metadata(&target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or_else(|_| {
                target.extension().is_none() && target == self.base_path
            });
        if is_dir {
            target = target.join(&source_name);
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExecuteError::Service(format!("failed to create target directory: {}", e))
            })?;
        }

        tokio::fs::copy(source, &target)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to copy file: {}", e)))?;

        logger.info(format!("File copied successfully to {}", target.display()));
        Ok(format!("File copied to {}", target.display()))
    }

    async fn delete_file(
        &self,
        target: PathBuf,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        logger.info(format!("Deleting file: {}", target.display()));

        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to delete file: {}", e)))?;

        logger.info("File deleted successfully");
        Ok(format!("File deleted: {}", target.display()))
    }

    async fn create_file(
        &self,
        req: &ExecRequest,
        target: PathBuf,
        logger: &TaskLogger,
    ) -> Result<String, ExecuteError> {
        logger.info(format!("Creating file: {}", target.display()));

        let content = req.param_str("content").unwrap_or("");
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExecuteError::Service(format!("failed to create target directory: {}", e))
            })?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to create file: {}", e)))?;

        logger.info("File created successfully");
        Ok(format!("File created: {}", target.display()))
    }
}

fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_").replace("..", "_")
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
