// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Elasticsearch executor: a JSON operation `{operation, index, …}`
//! supporting `bulk`, `update`, `delete_by_query`, and `index`, spoken
//! directly to the REST API.

use super::result::ExecutionResult;
use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use crate::security::SqlValidator;
use async_trait::async_trait;
use fc_core::{epoch_secs_now, TaskType};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct ElasticsearchExecutor {
    client: reqwest::Client,
    validator: SqlValidator,
}

struct Target {
    base_url: String,
    user: String,
    password: String,
    api_key: String,
}

impl ElasticsearchExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let strict = config
            .get("strict_mode")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10 * 60))
                .build()
                .unwrap_or_default(),
            validator: SqlValidator::new(false, strict),
        }
    }

    fn target_from(params: &serde_json::Map<String, serde_json::Value>) -> Target {
        let str_of = |key: &str| params.get(key).and_then(|v| v.as_str()).unwrap_or("");
        let host = match str_of("host") {
            "" => "localhost",
            host => host,
        };
        let port = params.get("port").and_then(|v| v.as_u64()).unwrap_or(9200);
        Target {
            base_url: format!("http://{host}:{port}"),
            user: str_of("user").into(),
            password: str_of("password").into(),
            api_key: str_of("api_key").into(),
        }
    }

    fn request(&self, target: &Target, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{}", target.base_url, path));
        if !target.api_key.is_empty() {
            builder = builder.header("authorization", format!("ApiKey {}", target.api_key));
        } else if !target.user.is_empty() {
            builder = builder.basic_auth(&target.user, Some(&target.password));
        }
        builder
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<(reqwest::StatusCode, String), ExecuteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ExecuteError::Service(format!("{} request failed: {}", what, e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(ExecuteError::Service(format!(
                "{} operation failed: {}",
                what, body
            )));
        }
        Ok((status, body))
    }
}

#[async_trait]
impl Executor for ElasticsearchExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Elasticsearch
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let start = Instant::now();
        let start_at = epoch_secs_now();

        if req.command.is_empty() {
            return Err(ExecuteError::Input("command is empty".into()));
        }

        let operation: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&req.command)
                .map_err(|e| ExecuteError::Input(format!("invalid JSON format: {}", e)))?;

        if let Err(violation) = self.validator.validate_es_operation(&operation) {
            logger.error(format!("Operation security validation failed: {}", violation));
            return Err(ExecuteError::Policy(violation.0));
        }

        let op_type = operation
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let index = operation
            .get("index")
            .and_then(|v| v.as_str())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| ExecuteError::Input("index is required".into()))?;

        let target = req
            .param_object("target")
            .map(|t| Self::target_from(t))
            .ok_or_else(|| ExecuteError::Input("target is required in params".into()))?;

        logger.info(format!(
            "Executing Elasticsearch {} on {} (index: {})",
            op_type, target.base_url, index
        ));

        let run = self.run_operation(&target, op_type, index, &operation, logger);
        let (affected, text) = tokio::select! {
            outcome = run => outcome?,
            _ = cancel.cancelled() => return Err(ExecuteError::Canceled),
        };

        let result = ExecutionResult {
            run_id: req.task_id.to_string(),
            task_id: req.task_id.to_string(),
            success: true,
            error_level: 0,
            rows_affected: affected,
            stage: "EXECUTED".into(),
            execute_time: format!("{:?}", start.elapsed()),
            start_at,
            end_at: epoch_secs_now(),
            text_result: text,
            ..Default::default()
        };
        Ok(result.render(false))
    }
}

impl ElasticsearchExecutor {
    async fn run_operation(
        &self,
        target: &Target,
        op_type: &str,
        index: &str,
        operation: &serde_json::Map<String, serde_json::Value>,
        logger: &TaskLogger,
    ) -> Result<(i64, String), ExecuteError> {
        match op_type {
            "bulk" => self.run_bulk(target, index, operation, logger).await,
            "update" => self.run_update(target, index, operation, logger).await,
            "delete_by_query" => self.run_delete_by_query(target, index, operation, logger).await,
            "index" => self.run_index(target, index, operation, logger).await,
            other => Err(ExecuteError::Input(format!(
                "unsupported operation type: {}",
                other
            ))),
        }
    }

    /// `actions` is a list of `{index: {...}}` / `{update: {...}}` /
    /// `{delete: {...}}` entries; each is rendered into NDJSON action and
    /// source lines.
    async fn run_bulk(
        &self,
        target: &Target,
        index: &str,
        operation: &serde_json::Map<String, serde_json::Value>,
        logger: &TaskLogger,
    ) -> Result<(i64, String), ExecuteError> {
        let actions = operation
            .get("actions")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ExecuteError::Input("actions field is required for bulk operation".into())
            })?;

        let mut body = String::new();
        for action in actions {
            let Some(action) = action.as_object() else {
                continue;
            };
            for (action_type, action_data) in action {
                let mut meta = serde_json::json!({ "_index": index });
                if let Some(id) = action_data.get("_id").and_then(|v| v.as_str()) {
                    meta["_id"] = id.into();
                }
                let line = serde_json::json!({ action_type: meta });
                body.push_str(&line.to_string());
                body.push('\n');

                if action_type == "index" || action_type == "update" {
                    if let Some(source) = action_data.get("_source") {
                        body.push_str(&source.to_string());
                        body.push('\n');
                    }
                }
            }
        }

        let builder = self
            .request(target, reqwest::Method::POST, "/_bulk")
            .header("content-type", "application/x-ndjson")
            .body(body);
        let (_, response_body) = self.send(builder, "bulk").await?;

        let affected = serde_json::from_str::<serde_json::Value>(&response_body)
            .ok()
            .and_then(|v| v.get("items").and_then(|i| i.as_array()).map(|i| i.len() as i64))
            .unwrap_or(actions.len() as i64);

        logger.info(format!("Bulk operation completed (Documents: {})", affected));
        Ok((
            affected,
            format!(
                "Bulk operation completed\nDocuments affected: {}\nResponse: {}",
                affected, response_body
            ),
        ))
    }

    async fn run_update(
        &self,
        target: &Target,
        index: &str,
        operation: &serde_json::Map<String, serde_json::Value>,
        logger: &TaskLogger,
    ) -> Result<(i64, String), ExecuteError> {
        let id = operation
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| ExecuteError::Input("id is required for update operation".into()))?;
        let doc = operation
            .get("doc")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ExecuteError::Input("doc field is required for update operation".into()))?;

        let path = format!("/{}/_update/{}", index, id);
        let builder = self
            .request(target, reqwest::Method::POST, &path)
            .json(&serde_json::json!({ "doc": doc }));
        let (_, body) = self.send(builder, "update").await?;

        logger.info(format!("Update operation completed (ID: {})", id));
        Ok((
            1,
            format!("Update operation completed\nID: {}\nResponse: {}", id, body),
        ))
    }

    async fn run_delete_by_query(
        &self,
        target: &Target,
        index: &str,
        operation: &serde_json::Map<String, serde_json::Value>,
        logger: &TaskLogger,
    ) -> Result<(i64, String), ExecuteError> {
        let query = operation
            .get("query")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                ExecuteError::Input("query field is required for delete_by_query operation".into())
            })?;

        let path = format!("/{}/_delete_by_query", index);
        let builder = self
            .request(target, reqwest::Method::POST, &path)
            .json(&serde_json::json!({ "query": query }));
        let (_, body) = self.send(builder, "delete_by_query").await?;

        let affected = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("deleted").and_then(|d| d.as_i64()))
            .unwrap_or(0);

        logger.info(format!("Delete by query completed (Documents: {})", affected));
        Ok((
            affected,
            format!(
                "Delete by query completed\nDocuments deleted: {}\nResponse: {}",
                affected, body
            ),
        ))
    }

    async fn run_index(
        &self,
        target: &Target,
        index: &str,
        operation: &serde_json::Map<String, serde_json::Value>,
        logger: &TaskLogger,
    ) -> Result<(i64, String), ExecuteError> {
        let doc = operation
            .get("doc")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ExecuteError::Input("doc field is required for index operation".into()))?;
        let id = operation.get("id").and_then(|v| v.as_str()).unwrap_or("");

        let path = if id.is_empty() {
            format!("/{}/_doc", index)
        } else {
            format!("/{}/_doc/{}", index, id)
        };
        let builder = self.request(target, reqwest::Method::POST, &path).json(doc);
        let (_, body) = self.send(builder, "index").await?;

        logger.info(format!("Index operation completed (ID: {})", id));
        Ok((
            1,
            format!("Index operation completed\nID: {}\nResponse: {}", id, body),
        ))
    }
}

#[cfg(test)]
#[path = "elasticsearch_tests.rs"]
mod tests;
