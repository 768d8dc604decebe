// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ClickHouse executor over the HTTP interface.
//!
//! Statements run one per request (ClickHouse HTTP accepts a single
//! statement); written-row counts come from the `X-ClickHouse-Summary`
//! header.

use super::result::ExecutionResult;
use super::sql_file::read_sql_from_file;
use super::{ExecOptions, ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use crate::security::SqlValidator;
use async_trait::async_trait;
use fc_core::{epoch_secs_now, TaskType};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct ClickhouseExecutor {
    client: reqwest::Client,
    validator: SqlValidator,
}

struct Target {
    url: String,
    user: String,
    password: String,
    database: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChSummary {
    #[serde(default)]
    written_rows: String,
}

impl ClickhouseExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let allow_dangerous = config
            .get("allow_dangerous_ops")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10 * 60))
                .build()
                .unwrap_or_default(),
            validator: SqlValidator::new(allow_dangerous, false),
        }
    }

    fn target_from(params: &serde_json::Map<String, serde_json::Value>) -> Target {
        let str_of = |key: &str| params.get(key).and_then(|v| v.as_str()).unwrap_or("");
        let host = match str_of("host") {
            "" => "localhost",
            host => host,
        };
        let port = params.get("port").and_then(|v| v.as_u64()).unwrap_or(8123);
        Target {
            url: format!("http://{host}:{port}/"),
            user: match str_of("user") {
                "" => "default".into(),
                user => user.into(),
            },
            password: str_of("password").into(),
            database: match str_of("database") {
                "" => "default".into(),
                db => db.into(),
            },
        }
    }

    async fn run_statement(
        &self,
        target: &Target,
        statement: &str,
    ) -> Result<(i64, String), ExecuteError> {
        let response = self
            .client
            .post(&target.url)
            .query(&[("database", target.database.as_str())])
            .basic_auth(&target.user, Some(&target.password))
            .body(statement.to_string())
            .send()
            .await
            .map_err(|e| ExecuteError::Service(format!("clickhouse request failed: {}", e)))?;

        let status = response.status();
        let written = response
            .headers()
            .get("x-clickhouse-summary")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| serde_json::from_str::<ChSummary>(v).ok())
            .and_then(|s| s.written_rows.parse::<i64>().ok())
            .unwrap_or(0);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ExecuteError::Service(format!(
                "clickhouse returned status {}: {}",
                status,
                body.trim()
            )));
        }
        Ok((written, body))
    }
}

#[async_trait]
impl Executor for ClickhouseExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Clickhouse
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let start = Instant::now();
        let start_at = epoch_secs_now();

        let file_sql = read_sql_from_file(
            req.file_id.as_deref(),
            req.param_str("file_path"),
            req.param_str("file_name"),
            logger,
        )
        .await?;
        let sql = match file_sql {
            Some(sql) if !sql.is_empty() => sql,
            _ => req.command.clone(),
        };
        if sql.is_empty() {
            return Err(ExecuteError::Input(
                "SQL command is empty (provide command or file_id)".into(),
            ));
        }

        if let Err(violation) = self.validator.validate(&sql) {
            logger.error(format!("SQL security validation failed: {}", violation));
            return Err(ExecuteError::Policy(violation.0));
        }

        let target = req
            .param_object("target")
            .map(|t| Self::target_from(t))
            .ok_or_else(|| ExecuteError::Input("target is required in params".into()))?;

        let opts = ExecOptions::from_params(&req.params);
        logger.info(format!(
            "Executing ClickHouse SQL on {} (database: {})",
            target.url, target.database
        ));

        let statements: Vec<&str> = sql
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if statements.is_empty() {
            return Err(ExecuteError::Input("no valid SQL statements found".into()));
        }

        let mut total_rows = 0i64;
        let mut results = Vec::new();

        for (i, stmt) in statements.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecuteError::Canceled);
            }

            let outcome = tokio::select! {
                outcome = self.run_statement(&target, stmt) => outcome,
                _ = cancel.cancelled() => return Err(ExecuteError::Canceled),
            };
            match outcome {
                Ok((rows, body)) => {
                    total_rows += rows;
                    logger.info(format!(
                        "Statement {} executed successfully (Written rows: {})",
                        i + 1,
                        rows
                    ));
                    let mut text = format!("Statement {}: SUCCESS", i + 1);
                    if rows > 0 {
                        text.push_str(&format!(" (Written rows: {})", rows));
                    }
                    if !body.trim().is_empty() {
                        text.push_str(&format!("\n{}", body.trim()));
                    }
                    text.push_str(&format!("\nSQL: {}", stmt));
                    results.push(text);
                }
                Err(e) => {
                    logger.error(format!("Statement {} failed: {}", i + 1, e));
                    results.push(format!("Statement {}: ERROR - {}\nSQL: {}", i + 1, e, stmt));
                    return Err(ExecuteError::Failed {
                        error: format!("ClickHouse execution failed at statement {}: {}", i + 1, e),
                        output: results.join("\n\n"),
                    });
                }
            }

            if opts.sleep_ms > 0 && i + 1 < statements.len() {
                tokio::time::sleep(Duration::from_millis(opts.sleep_ms)).await;
            }
        }

        let result = ExecutionResult {
            run_id: req.task_id.to_string(),
            task_id: req.task_id.to_string(),
            success: true,
            error_level: 0,
            rows_affected: total_rows,
            stage: "EXECUTED".into(),
            execute_time: format!("{:?}", start.elapsed()),
            start_at,
            end_at: epoch_secs_now(),
            text_result: results.join("\n\n"),
            ..Default::default()
        };
        Ok(result.render(false))
    }
}

#[cfg(test)]
#[path = "clickhouse_tests.rs"]
mod tests;
