// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MySQL executor.
//!
//! Statements are routed through an external review gateway that audits,
//! executes, and reports per-statement verdicts (stage, error level, rows
//! affected, rollback SQL). The agent pre-validates the SQL before handing
//! it off; the gateway's own audit is the second line.

use super::result::ExecutionResult;
use super::sql_file::read_sql_from_file;
use super::{ExecOptions, ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use crate::security::SqlValidator;
use async_trait::async_trait;
use fc_core::{epoch_secs_now, TaskType};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const DEFAULT_GATEWAY_URL: &str = "http://localhost:4000";

/// Request body for the gateway's `/check` endpoint.
#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    sql: &'a str,
    db_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    backup: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    error_code: i32,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    data: Vec<GatewayVerdict>,
}

/// Per-statement verdict from the review gateway.
#[derive(Debug, Deserialize)]
struct GatewayVerdict {
    #[serde(default)]
    order_id: i32,
    #[serde(default)]
    stage: String,
    #[serde(default)]
    error_level: i32,
    #[serde(default)]
    stage_status: String,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    sql: String,
    #[serde(default)]
    affected_rows: i64,
    #[serde(default)]
    backup_dbname: String,
    #[serde(default)]
    execute_time: String,
    #[serde(default)]
    rollback_sql: String,
}

pub struct MysqlExecutor {
    gateway_url: String,
    client: reqwest::Client,
    validator: SqlValidator,
}

impl MysqlExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let gateway_url = config
            .get("goinception_url")
            .or_else(|| config.get("gateway_url"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_GATEWAY_URL)
            .trim_end_matches('/')
            .to_string();

        let allow_dangerous = config
            .get("allow_dangerous_ops")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let strict = config
            .get("strict_mode")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Self {
            gateway_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30 * 60))
                .build()
                .unwrap_or_default(),
            validator: SqlValidator::new(allow_dangerous, strict),
        }
    }

    fn database_name(&self, req: &ExecRequest) -> String {
        if let Some(target) = req.param_object("target") {
            for key in ["db", "database"] {
                if let Some(db) = target.get(key).and_then(|v| v.as_str()) {
                    if !db.is_empty() {
                        return db.to_string();
                    }
                }
            }
        }
        req.param_str("database").unwrap_or("").to_string()
    }

    async fn call_gateway(
        &self,
        sql: &str,
        db_name: &str,
        backup: bool,
        logger: &TaskLogger,
    ) -> Result<GatewayResponse, ExecuteError> {
        let url = format!("{}/check", self.gateway_url);
        logger.info(format!("Sending request to review gateway: {}", url));

        let body = GatewayRequest {
            sql,
            db_name,
            backup: if backup { "1" } else { "0" },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecuteError::Service(format!("review gateway request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to read gateway response: {}", e)))?;
        if !status.is_success() {
            return Err(ExecuteError::Service(format!(
                "review gateway returned status {}: {}",
                status, text
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| ExecuteError::Service(format!("failed to parse gateway response: {}", e)))
    }

    fn rollup(
        &self,
        response: &GatewayResponse,
        task_id: &str,
        start: Instant,
        start_at: i64,
        logger: &TaskLogger,
    ) -> ExecutionResult {
        let mut has_error = response.error_code != 0;
        let mut total_rows = 0i64;
        let mut max_error_level = 0i32;
        let mut last_stage = String::new();
        let mut last_error = String::new();
        let mut rollback = Vec::new();
        let mut texts = Vec::new();

        for verdict in &response.data {
            match verdict.error_level {
                2 => has_error = true,
                _ => {}
            }

            let mut line = format!("[{}] {}", verdict.stage, verdict.stage_status);
            if !verdict.error_msg.is_empty() {
                line.push_str(&format!(": {}", verdict.error_msg));
            }
            if verdict.affected_rows > 0 {
                line.push_str(&format!(" (Affected rows: {})", verdict.affected_rows));
            }
            if !verdict.execute_time.is_empty() {
                line.push_str(&format!(" (Execute time: {})", verdict.execute_time));
            }
            match verdict.error_level {
                2 => logger.error(line),
                1 => logger.warn(line),
                _ => logger.info(line),
            }
            if !verdict.rollback_sql.is_empty() {
                logger.info(format!("Rollback SQL generated: {}", verdict.rollback_sql));
                rollback.push(verdict.rollback_sql.clone());
            }

            total_rows += verdict.affected_rows;
            max_error_level = max_error_level.max(verdict.error_level);
            last_stage = verdict.stage.clone();
            if !verdict.error_msg.is_empty() {
                last_error = verdict.error_msg.clone();
            }

            let mut text = format!("Order ID: {}\n", verdict.order_id);
            text.push_str(&format!("Stage: {}\n", verdict.stage));
            text.push_str(&format!("Status: {}\n", verdict.stage_status));
            if !verdict.error_msg.is_empty() {
                text.push_str(&format!("Error: {}\n", verdict.error_msg));
            }
            if verdict.affected_rows > 0 {
                text.push_str(&format!("Affected Rows: {}\n", verdict.affected_rows));
            }
            if !verdict.execute_time.is_empty() {
                text.push_str(&format!("Execute Time: {}\n", verdict.execute_time));
            }
            if !verdict.backup_dbname.is_empty() {
                text.push_str(&format!("Backup DB: {}\n", verdict.backup_dbname));
            }
            if !verdict.rollback_sql.is_empty() {
                text.push_str(&format!("Rollback SQL: {}\n", verdict.rollback_sql));
            }
            text.push_str(&format!("SQL: {}\n", verdict.sql));
            texts.push(text);
        }

        let mut result = ExecutionResult {
            run_id: task_id.to_string(),
            task_id: task_id.to_string(),
            success: !has_error,
            error_level: max_error_level,
            rows_affected: total_rows,
            stage: last_stage,
            rollback_sql: rollback.join("\n"),
            backup_dbname: response
                .data
                .iter()
                .rev()
                .find(|v| !v.backup_dbname.is_empty())
                .map(|v| v.backup_dbname.clone())
                .unwrap_or_default(),
            execute_time: format!("{:?}", start.elapsed()),
            error_msg: last_error,
            start_at,
            end_at: epoch_secs_now(),
            text_result: texts.join("\n\n"),
        };

        if has_error {
            if result.error_msg.is_empty() {
                result.error_msg = if response.error_msg.is_empty() {
                    "SQL execution failed".to_string()
                } else {
                    response.error_msg.clone()
                };
            }
            result.success = false;
            result.error_level = 2;
        }

        result
    }
}

#[async_trait]
impl Executor for MysqlExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Mysql
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
        logger.audit("SQL passed security validation, sending to review gateway");

        let mut db_name = self.database_name(req);
        if db_name.is_empty() {
            db_name = "mysql".to_string();
            logger.info(
                "No database name specified, using default 'mysql' \
                 (database name can be specified in SQL as 'database.table')",
            );
        }

        // Backup defaults on for MySQL unless explicitly disabled.
        let mut opts = ExecOptions::from_params(&req.params);
        let backup_set = req
            .params
            .get("exec_options")
            .and_then(|v| v.as_object())
            .map(|o| o.contains_key("backup"))
            .unwrap_or(false);
        if !backup_set && req.param_bool("no_backup") != Some(true) {
            opts.backup = true;
        }
        let backup = opts.backup;

        logger.info(format!(
            "Executing MySQL SQL via review gateway (database: {}, can be overridden in SQL)",
            db_name
        ));

        let response = tokio::select! {
            response = self.call_gateway(&sql, &db_name, backup, logger) => response?,
            _ = cancel.cancelled() => return Err(ExecuteError::Canceled),
        };

        let result = self.rollup(&response, req.task_id.as_str(), start, start_at, logger);
        if !result.success {
            return Err(ExecuteError::Failed {
                error: result.error_msg.clone(),
                output: result.render(false),
            });
        }
        Ok(result.render(false))
    }
}

#[cfg(test)]
#[path = "mysql_tests.rs"]
mod tests;
