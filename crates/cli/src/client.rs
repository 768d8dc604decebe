// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper over the cloud's `/api/v1` surface.

use anyhow::{anyhow, Context};
use fc_core::{LogRecord, Task};
use serde_json::json;

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Surface the server's `{"error": …}` body on non-2xx responses.
    async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Err(anyhow!("request failed ({}): {}", status, message))
    }

    pub async fn create_task(
        &self,
        agent_id: &str,
        task_type: &str,
        command: &str,
        params: serde_json::Value,
        file_id: Option<&str>,
    ) -> anyhow::Result<Task> {
        let mut body = json!({
            "agent_id": agent_id,
            "type": task_type,
            "command": command,
            "params": params,
        });
        if let Some(file_id) = file_id {
            body["file_id"] = file_id.into();
        }

        let response = self
            .http
            .post(self.url("/api/v1/tasks"))
            .json(&body)
            .send()
            .await
            .context("failed to reach cloud")?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_task(&self, task_id: &str) -> anyhow::Result<Task> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/tasks/{task_id}")))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn list(&self, resource: &str, query: &[(&str, String)]) -> anyhow::Result<serde_json::Value> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/{resource}")))
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn task_logs(&self, task_id: &str, limit: u32) -> anyhow::Result<Vec<LogRecord>> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/tasks/{task_id}/logs")))
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<fc_core::FileRecord> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/api/v1/files"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
