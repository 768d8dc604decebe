// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/api/v1` REST surface over the same state the WebSocket layer updates.

use crate::files::FileError;
use crate::registry::RegistryError;
use crate::server::AppCtx;
use crate::tasks::DispatchError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use fc_core::{FileId, TaskType};
use fc_storage::StoreError;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

/// API error rendered as `{"error": …}` with a mapped status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::AgentNotFound(_)
            | StoreError::TaskNotFound(_)
            | StoreError::FileNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Store(e) => e.into(),
            RegistryError::NotConnected(_) | RegistryError::ConnectionClosed(_) => {
                Self::new(StatusCode::CONFLICT, e.to_string())
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::AgentNotOnline(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            DispatchError::TaskNotRunning(_, _) => Self::new(StatusCode::CONFLICT, e.to_string()),
            DispatchError::SendFailed(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            DispatchError::Store(e) => e.into(),
        }
    }
}

impl From<FileError> for ApiError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::Empty => Self::bad_request(e.to_string()),
            FileError::Store(e) => e.into(),
            FileError::Io(e) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

// === Agents ===

pub async fn list_agents(State(ctx): State<Arc<AppCtx>>) -> Result<Response, ApiError> {
    let agents = ctx.registry.list()?;
    Ok(Json(agents).into_response())
}

pub async fn get_agent(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let agent = ctx.store.get_agent(&id)?;
    Ok(Json(agent).into_response())
}

pub async fn agent_status(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let status = ctx.registry.status(&id);
    Ok(Json(json!({ "status": status })).into_response())
}

#[derive(Deserialize)]
pub struct UpdateAgentBody {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub async fn update_agent(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAgentBody>,
) -> Result<Response, ApiError> {
    let tags = body.tags.unwrap_or_default();
    let agent = ctx.registry.update_tags(&id, tags)?;
    Ok(Json(agent).into_response())
}

pub async fn delete_agent(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    ctx.registry.delete(&id)?;
    Ok(Json(json!({ "message": "agent deleted" })).into_response())
}

// === Tasks ===

#[derive(Deserialize)]
pub struct CreateTaskBody {
    agent_id: String,
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    params: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    file_id: Option<String>,
}

pub async fn create_task(
    State(ctx): State<Arc<AppCtx>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Response, ApiError> {
    if body.agent_id.is_empty() {
        return Err(ApiError::bad_request("agent_id is required"));
    }
    let task_type = TaskType::from_str(&body.task_type)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let task = ctx.tasks.create_task(
        &body.agent_id,
        task_type,
        &body.command,
        body.params,
        body.file_id.filter(|f| !f.is_empty()).map(FileId::from_string),
    )?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

#[derive(Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default = "default_task_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_task_limit() -> u32 {
    50
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppCtx>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Response, ApiError> {
    let tasks = ctx.store.list_tasks(
        query.agent_id.as_deref().filter(|a| !a.is_empty()),
        query.limit,
        query.offset,
    )?;
    Ok(Json(tasks).into_response())
}

pub async fn get_task(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let task = ctx.store.get_task(&id)?;
    Ok(Json(task).into_response())
}

#[derive(Deserialize)]
pub struct TaskLogsQuery {
    #[serde(default = "default_log_limit")]
    limit: u32,
}

fn default_log_limit() -> u32 {
    1000
}

pub async fn task_logs(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
    Query(query): Query<TaskLogsQuery>,
) -> Result<Response, ApiError> {
    let logs = ctx.store.get_task_logs(&id, query.limit)?;
    Ok(Json(logs).into_response())
}

pub async fn cancel_task(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    ctx.tasks.cancel_task(&id)?;
    Ok(Json(json!({ "message": "task canceled" })).into_response())
}

// === Files ===

pub async fn upload_file(
    State(ctx): State<Arc<AppCtx>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let record = ctx.files.save_upload(&name, &content_type, &bytes).await?;
        return Ok((StatusCode::CREATED, Json(record)).into_response());
    }
    Err(ApiError::bad_request("multipart field 'file' is required"))
}

#[derive(Deserialize)]
pub struct ListFilesQuery {
    #[serde(default = "default_task_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

pub async fn list_files(
    State(ctx): State<Arc<AppCtx>>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Response, ApiError> {
    let files = ctx.store.list_files(query.limit, query.offset)?;
    Ok(Json(files).into_response())
}

pub async fn get_file(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = ctx.store.get_file(&id)?;
    Ok(Json(file).into_response())
}

pub async fn download_file(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = ctx.store.get_file(&id)?;
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let disposition = format!("attachment; filename=\"{}\"", file.name.replace('"', "_"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct DistributeBody {
    agent_ids: Vec<String>,
    #[serde(default)]
    path: String,
}

pub async fn distribute_file(
    State(ctx): State<Arc<AppCtx>>,
    Path(id): Path<String>,
    Json(body): Json<DistributeBody>,
) -> Result<Response, ApiError> {
    if body.agent_ids.is_empty() {
        return Err(ApiError::bad_request("agent_ids is required"));
    }
    let created = ctx.files.distribute(
        &ctx.tasks,
        &FileId::from_string(id),
        &body.agent_ids,
        &body.path,
    )?;
    Ok(Json(json!({
        "message": "file distribution started",
        "task_ids": created,
    }))
    .into_response())
}
