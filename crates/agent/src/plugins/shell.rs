// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell executor: runs a command line under `sh -c`, streaming output
//! lines into the task log.

use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use crate::security::{AuditLogger, CommandValidator, SecurityConfig};
use async_trait::async_trait;
use fc_core::TaskType;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct ShellExecutor {
    validator: CommandValidator,
    audit: AuditLogger,
}

impl ShellExecutor {
    pub fn new(agent_id: &str, security_config_path: &str) -> Result<Self, ExecuteError> {
        let config = SecurityConfig::load(security_config_path)
            .map_err(|e| ExecuteError::Input(format!("failed to load security config: {}", e)))?;
        let validator = CommandValidator::new(&config)
            .map_err(|e| ExecuteError::Input(format!("failed to compile command policy: {}", e)))?;
        Ok(Self {
            validator,
            audit: AuditLogger::new(agent_id),
        })
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Shell
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let command = req.command.as_str();
        if command.is_empty() {
            return Err(ExecuteError::Input("command is empty".into()));
        }
        let task_id = req.task_id.as_str();
        let start = Instant::now();

        if let Err(violation) = self.validator.validate(command) {
            self.audit
                .command_attempt(task_id, "shell", command, false, &violation.0);
            logger.error(format!("Command blocked by security policy: {}", violation));
            return Err(ExecuteError::Policy(violation.0));
        }
        self.audit
            .command_attempt(task_id, "shell", command, true, "");

        logger.info(format!("Executing command: {}", command));

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecuteError::Service(format!("failed to start command: {}", e)))?;

        let output = Arc::new(Mutex::new(String::new()));

        let stdout_task = child.stdout.take().map(|stdout| {
            let logger = logger.clone();
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    output.lock().await.push_str(&format!("{line}\n"));
                    if !line.trim().is_empty() {
                        logger.info(line);
                    }
                }
            })
        });
        let stderr_task = child.stderr.take().map(|stderr| {
            let logger = logger.clone();
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    output.lock().await.push_str(&format!("{line}\n"));
                    if !line.trim().is_empty() {
                        logger.error(line);
                    }
                }
            })
        });

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| ExecuteError::Service(format!("command failed: {}", e)))?
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                logger.warn("Command canceled");
                self.audit.command_result(
                    task_id,
                    "shell",
                    command,
                    "canceled",
                    None,
                    start.elapsed(),
                );
                return Err(ExecuteError::Canceled);
            }
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        let result = output.lock().await.clone();
        let elapsed = start.elapsed();

        if status.success() {
            self.audit
                .command_result(task_id, "shell", command, "success", None, elapsed);
            logger.info("Command completed successfully");
            Ok(result)
        } else {
            let code = status.code().unwrap_or(-1);
            let error = format!("command exited with status {}", code);
            self.audit
                .command_result(task_id, "shell", command, "failed", Some(&error), elapsed);
            logger.error(format!("Command failed: {}", error));
            Err(ExecuteError::Failed {
                error,
                output: result,
            })
        }
    }
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
