// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MongoDB executor: a JSON array (or single object) of operations
//! `{operation, collection, …}` executed against a target database.

use super::result::ExecutionResult;
use super::{ExecOptions, ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use crate::security::SqlValidator;
use async_trait::async_trait;
use fc_core::{epoch_secs_now, TaskType};
use futures_util::TryStreamExt;
use mongodb::bson::{self, Document};
use mongodb::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Cap on documents returned by a `find` operation.
const FIND_LIMIT: i64 = 100;

pub struct MongoExecutor {
    /// Clients cached by connection URI; invalid entries lazily replaced.
    connections: RwLock<HashMap<String, Client>>,
    validator: SqlValidator,
}

impl MongoExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let strict = config
            .get("strict_mode")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self {
            connections: RwLock::new(HashMap::new()),
            validator: SqlValidator::new(false, strict),
        }
    }

    fn connection_uri(target: &serde_json::Map<String, serde_json::Value>) -> String {
        let str_of = |key: &str| target.get(key).and_then(|v| v.as_str()).unwrap_or("");
        let host = match str_of("host") {
            "" => "localhost",
            host => host,
        };
        let port = target.get("port").and_then(|v| v.as_u64()).unwrap_or(27017);
        let user = str_of("user");
        let password = str_of("password");
        let database = str_of("database");

        let mut uri = if !user.is_empty() && !password.is_empty() {
            format!("mongodb://{user}:{password}@{host}:{port}")
        } else {
            format!("mongodb://{host}:{port}")
        };
        if !database.is_empty() {
            uri.push('/');
            uri.push_str(database);
        }
        uri
    }

    fn database_name(target: &serde_json::Map<String, serde_json::Value>) -> String {
        for key in ["db", "database"] {
            if let Some(db) = target.get(key).and_then(|v| v.as_str()) {
                if !db.is_empty() {
                    return db.to_string();
                }
            }
        }
        "admin".to_string()
    }

    async fn client_for(&self, uri: &str) -> Result<Client, ExecuteError> {
        if let Some(client) = self.connections.read().await.get(uri) {
            return Ok(client.clone());
        }

        let mut cache = self.connections.write().await;
        if let Some(client) = cache.get(uri) {
            return Ok(client.clone());
        }

        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to connect: {}", e)))?;
        cache.insert(uri.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Executor for MongoExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Mongo
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

        let operations = parse_operations(&req.command)?;

        // Validate everything before touching the database.
        for (i, op) in operations.iter().enumerate() {
            if let Err(violation) = self.validator.validate_mongo_operation(op) {
                logger.error(format!(
                    "Operation {} security validation failed: {}",
                    i + 1,
                    violation
                ));
                return Err(ExecuteError::Policy(format!(
                    "operation {}: {}",
                    i + 1,
                    violation
                )));
            }
        }
        logger.audit(format!(
            "Executing {} MongoDB operation(s) after security validation",
            operations.len()
        ));

        let target = req
            .param_object("target")
            .ok_or_else(|| ExecuteError::Input("target is required in params".into()))?;
        let uri = Self::connection_uri(target);
        let db_name = Self::database_name(target);
        let client = self.client_for(&uri).await?;
        let db = client.database(&db_name);

        let opts = ExecOptions::from_params(&req.params);
        logger.info(format!(
            "Executing MongoDB operations on database: {}",
            db_name
        ));

        let mut total_affected = 0i64;
        let mut results = Vec::new();

        for (i, op) in operations.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecuteError::Canceled);
            }

            let op_type = op.get("operation").and_then(|v| v.as_str()).unwrap_or("");
            let collection = op
                .get("collection")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ExecuteError::Input(format!("operation {}: collection is required", i + 1))
                })?;

            logger.audit(format!(
                "Executing operation {}: {} on collection {}",
                i + 1,
                op_type,
                collection
            ));

            let coll = db.collection::<Document>(collection);
            let run = run_operation(&coll, op_type, op, logger, i + 1);
            let outcome = tokio::select! {
                outcome = run => outcome,
                _ = cancel.cancelled() => return Err(ExecuteError::Canceled),
            };

            match outcome {
                Ok((affected, text)) => {
                    total_affected += affected;
                    results.push(format!("Operation {}: {}", i + 1, text));
                }
                Err(e) => {
                    logger.error(format!("Operation {} failed: {}", i + 1, e));
                    results.push(format!("Operation {}: ERROR - {}", i + 1, e));
                    return Err(ExecuteError::Failed {
                        error: format!("MongoDB operation {} failed: {}", i + 1, e),
                        output: results.join("\n"),
                    });
                }
            }

            if opts.sleep_ms > 0 && i + 1 < operations.len() {
                tokio::time::sleep(Duration::from_millis(opts.sleep_ms)).await;
            }
        }

        let result = ExecutionResult {
            run_id: req.task_id.to_string(),
            task_id: req.task_id.to_string(),
            success: true,
            error_level: 0,
            rows_affected: total_affected,
            stage: "EXECUTED".into(),
            execute_time: format!("{:?}", start.elapsed()),
            start_at,
            end_at: epoch_secs_now(),
            text_result: results.join("\n"),
            ..Default::default()
        };
        Ok(result.render(false))
    }
}

/// Accept a JSON array of operations or a single operation object.
fn parse_operations(
    command: &str,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ExecuteError> {
    if let Ok(list) = serde_json::from_str::<Vec<serde_json::Map<String, serde_json::Value>>>(command)
    {
        return Ok(list);
    }
    if let Ok(single) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(command) {
        return Ok(vec![single]);
    }
    Err(ExecuteError::Input(
        "MongoDB command must be a JSON operation or operation array".into(),
    ))
}

fn to_document(value: &serde_json::Value) -> Result<Document, ExecuteError> {
    bson::to_document(value).map_err(|e| ExecuteError::Input(format!("invalid document: {}", e)))
}

async fn run_operation(
    coll: &mongodb::Collection<Document>,
    op_type: &str,
    op: &serde_json::Map<String, serde_json::Value>,
    logger: &TaskLogger,
    op_num: usize,
) -> Result<(i64, String), ExecuteError> {
    match op_type {
        "insert" => {
            let documents = op
                .get("documents")
                .and_then(|v| v.as_array())
                .ok_or_else(|| {
                    ExecuteError::Input("documents field is required for insert operation".into())
                })?;
            let docs = documents
                .iter()
                .map(to_document)
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = coll
                .insert_many(docs)
                .await
                .map_err(|e| ExecuteError::Service(e.to_string()))?;
            let affected = outcome.inserted_ids.len() as i64;
            logger.info(format!("Operation {}: Inserted {} documents", op_num, affected));
            Ok((affected, format!("INSERT SUCCESS (Documents: {})", affected)))
        }
        "update" => {
            let filter = op.get("filter").ok_or_else(|| {
                ExecuteError::Input("filter field is required for update operation".into())
            })?;
            let update = op.get("update").ok_or_else(|| {
                ExecuteError::Input("update field is required for update operation".into())
            })?;
            let update_doc = bson::doc! { "$set": to_document(update)? };
            let outcome = coll
                .update_many(to_document(filter)?, update_doc)
                .await
                .map_err(|e| ExecuteError::Service(e.to_string()))?;
            let affected = outcome.modified_count as i64;
            logger.info(format!("Operation {}: Updated {} documents", op_num, affected));
            Ok((affected, format!("UPDATE SUCCESS (Documents: {})", affected)))
        }
        "delete" => {
            let filter = op.get("filter").ok_or_else(|| {
                ExecuteError::Input("filter field is required for delete operation".into())
            })?;
            let outcome = coll
                .delete_many(to_document(filter)?)
                .await
                .map_err(|e| ExecuteError::Service(e.to_string()))?;
            let affected = outcome.deleted_count as i64;
            logger.info(format!("Operation {}: Deleted {} documents", op_num, affected));
            Ok((affected, format!("DELETE SUCCESS (Documents: {})", affected)))
        }
        "find" => {
            let filter = match op.get("filter") {
                Some(filter) => to_document(filter)?,
                None => Document::new(),
            };
            let cursor = coll
                .find(filter)
                .limit(FIND_LIMIT)
                .await
                .map_err(|e| ExecuteError::Service(e.to_string()))?;
            let docs: Vec<Document> = cursor
                .try_collect()
                .await
                .map_err(|e| ExecuteError::Service(e.to_string()))?;
            let affected = docs.len() as i64;
            logger.info(format!("Operation {}: Found {} documents", op_num, affected));
            let rendered = docs
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            Ok((
                affected,
                format!("FIND SUCCESS (Documents: {})\n{}", affected, rendered),
            ))
        }
        other => Err(ExecuteError::Input(format!(
            "unsupported operation type '{}'",
            other
        ))),
    }
}

#[cfg(test)]
#[path = "mongo_tests.rs"]
mod tests;
