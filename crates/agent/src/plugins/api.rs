// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP probe executor. The method is the command; URL, headers, and body
//! travel in `params`.

use super::{ExecRequest, ExecuteError, Executor};
use crate::logger::TaskLogger;
use async_trait::async_trait;
use fc_core::TaskType;
use reqwest::Method;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ApiExecutor {
    client: reqwest::Client,
    timeout: Duration,
}

impl ApiExecutor {
    pub fn new(config: &serde_json::Map<String, serde_json::Value>) -> Self {
        let timeout_secs = config.get("timeout").and_then(|v| v.as_u64()).unwrap_or(30);
        let verify_ssl = config
            .get("verify_ssl")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Executor for ApiExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Api
    }

    async fn execute(
        &self,
        req: &ExecRequest,
        logger: &TaskLogger,
        cancel: &CancellationToken,
    ) -> Result<String, ExecuteError> {
        let method_str = if req.command.is_empty() {
            "GET"
        } else {
            req.command.as_str()
        };
        let method = Method::from_str(&method_str.to_uppercase())
            .map_err(|_| ExecuteError::Input(format!("invalid HTTP method: {}", method_str)))?;

        let url = req
            .param_str("url")
            .ok_or_else(|| ExecuteError::Input("url is required in params".into()))?;

        let mut request = self.client.request(method.clone(), url).timeout(self.timeout);

        match req.params.get("body") {
            Some(serde_json::Value::String(body)) if !body.is_empty() => {
                request = request.header("content-type", "text/plain").body(body.clone());
            }
            Some(serde_json::Value::Object(body)) => {
                request = request.json(body);
            }
            _ => {}
        }

        if let Some(headers) = req.param_object("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key, value);
                }
            }
        }

        logger.info(format!("Making {} request to: {}", method, url));

        let response = tokio::select! {
            response = request.send() => {
                response.map_err(|e| ExecuteError::Service(format!("request failed: {}", e)))?
            }
            _ = cancel.cancelled() => return Err(ExecuteError::Canceled),
        };

        let status = response.status();
        let mut rendered = format!("Status: {}\nHeaders:\n", status);
        for (key, value) in response.headers() {
            rendered.push_str(&format!("  {}: {}\n", key, value.to_str().unwrap_or("")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ExecuteError::Service(format!("failed to read response: {}", e)))?;
        rendered.push_str(&format!("\nBody:\n{}", body));

        logger.info(format!("Response status: {}", status));
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            logger.info(line);
        }

        if status.as_u16() >= 400 {
            return Err(ExecuteError::Failed {
                error: format!("HTTP error: {}", status),
                output: rendered,
            });
        }
        Ok(rendered)
    }
}
