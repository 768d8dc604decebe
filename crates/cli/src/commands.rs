// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations.

use crate::client::ApiClient;
use crate::exit_error::ExitError;
use anyhow::{anyhow, Context};
use fc_core::TaskStatus;
use std::path::Path;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Create a task and wait for it to reach a terminal state.
pub async fn run(
    api: &ApiClient,
    task_type: &str,
    command: &str,
    file: Option<std::path::PathBuf>,
    file_id: Option<String>,
    agent: &str,
    params: &str,
) -> Result<(), ExitError> {
    if agent.is_empty() {
        return Err(ExitError::new(anyhow!("--agent is required")));
    }

    let command = match &file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => command.to_string(),
    };
    if command.is_empty() && file_id.is_none() {
        return Err(ExitError::new(anyhow!("--command, --file, or --file-id is required")));
    }

    let params: serde_json::Value =
        serde_json::from_str(params).context("invalid params JSON")?;

    let task = api
        .create_task(agent, task_type, &command, params, file_id.as_deref())
        .await?;
    println!("Task created: {}", task.id);
    println!("Status: {}", task.status);

    if task.status.is_terminal() {
        return finish(&task.status, &task.result, &task.error);
    }

    println!("Waiting for task to complete...");
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let task = api.get_task(task.id.as_str()).await?;
        if task.status.is_terminal() {
            println!("\nTask completed with status: {}", task.status);
            return finish(&task.status, &task.result, &task.error);
        }
    }
}

fn finish(status: &TaskStatus, result: &str, error: &str) -> Result<(), ExitError> {
    if !result.is_empty() {
        println!("Result:\n{}", result);
    }
    if !error.is_empty() {
        eprintln!("Error:\n{}", error);
    }
    match status {
        TaskStatus::Success => Ok(()),
        status => Err(ExitError::with_code(
            1,
            anyhow!("task ended with status {}", status),
        )),
    }
}

/// List tasks or agents as pretty JSON.
pub async fn list(api: &ApiClient, resource: &str, agent: &str, limit: u32) -> Result<(), ExitError> {
    if resource != "tasks" && resource != "agents" {
        return Err(ExitError::new(anyhow!(
            "unknown resource {:?} (expected tasks or agents)",
            resource
        )));
    }

    let mut query = vec![("limit", limit.to_string())];
    if resource == "tasks" && !agent.is_empty() {
        query.push(("agent_id", agent.to_string()));
    }

    let value = api.list(resource, &query).await?;
    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    Ok(())
}

/// Print a task's logs, oldest first.
pub async fn logs(api: &ApiClient, task_id: &str, limit: u32) -> Result<(), ExitError> {
    let logs = api.task_logs(task_id, limit).await?;
    for record in logs {
        let when = chrono::DateTime::from_timestamp(record.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| record.timestamp.to_string());
        println!(
            "[{}] [{}] {}",
            when,
            record.level.to_string().to_uppercase(),
            record.message
        );
    }
    Ok(())
}

/// Upload a local file and print its record.
pub async fn upload(api: &ApiClient, path: &Path) -> Result<(), ExitError> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let record = api.upload(&name, bytes).await?;
    println!("File uploaded: {}", record.id);
    println!("Name: {}", record.name);
    println!("Size: {} bytes", record.size);
    Ok(())
}
