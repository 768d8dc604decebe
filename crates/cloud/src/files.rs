// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upload storage: content-addressed dedup over a flat directory.

use crate::tasks::{DispatchError, TaskManager};
use fc_core::{epoch_ms_now, FileId, FileRecord, TaskType};
use fc_storage::{Store, StoreError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors from file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("empty upload")]
    Empty,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stores uploaded files on disk and records them in the store.
pub struct FileStore {
    store: Arc<Store>,
    root: PathBuf,
}

impl FileStore {
    pub fn new(store: Arc<Store>, root: impl Into<PathBuf>) -> Result<Self, FileError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { store, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an upload, deduplicating by content digest.
    ///
    /// Identical bytes return the existing record. New content is written
    /// under a sanitized version of the original name; a name collision gets
    /// the first 8 characters of the file id as a suffix.
    pub async fn save_upload(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<FileRecord, FileError> {
        if bytes.is_empty() {
            return Err(FileError::Empty);
        }

        let digest = hex_digest(bytes);
        if let Some(existing) = self.store.get_file_by_digest(&digest)? {
            tracing::debug!(file_id = %existing.id, "upload deduplicated by digest");
            return Ok(existing);
        }

        let file_id = FileId::new();
        let mut name = sanitize_name(original_name);
        if name.is_empty() {
            name = file_id.short(8).to_string();
        }

        let mut path = self.root.join(&name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let (stem, ext) = split_name(&name);
            let suffixed = if ext.is_empty() {
                format!("{}-{}", stem, file_id.short(8))
            } else {
                format!("{}-{}.{}", stem, file_id.short(8), ext)
            };
            path = self.root.join(suffixed);
        }

        tokio::fs::write(&path, bytes).await?;

        let record = FileRecord {
            id: file_id,
            name: original_name.to_string(),
            path: path.to_string_lossy().into_owned(),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
            digest,
            created_at_ms: epoch_ms_now(),
        };
        if let Err(e) = self.store.create_file(&record) {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        tracing::info!(file_id = %record.id, name = %record.name, size = record.size, "file stored");
        Ok(record)
    }

    /// Create one `file` task per target agent, skipping agents without a
    /// live connection. Returns the ids of the created tasks.
    pub fn distribute(
        &self,
        tasks: &TaskManager,
        file_id: &FileId,
        agent_ids: &[String],
        target_path: &str,
    ) -> Result<Vec<String>, FileError> {
        let file = self.store.get_file(file_id.as_str())?;

        let mut created = Vec::new();
        for agent_id in agent_ids {
            let mut params = serde_json::Map::new();
            params.insert("operation".into(), "distribute".into());
            params.insert("file_id".into(), file_id.to_string().into());
            params.insert("file_path".into(), file.path.clone().into());
            params.insert("file_name".into(), file.name.clone().into());
            if !target_path.is_empty() {
                params.insert("target_path".into(), target_path.into());
            }

            match tasks.create_task(agent_id, TaskType::File, "", Some(params), Some(file_id.clone()))
            {
                Ok(task) => created.push(task.id.to_string()),
                Err(DispatchError::AgentNotOnline(_)) => {
                    tracing::debug!(%agent_id, "skipping offline agent in distribution");
                }
                Err(e) => {
                    tracing::warn!(%agent_id, error = %e, "file distribution task failed");
                }
            }
        }
        Ok(created)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Strip path separators and traversal sequences from an uploaded name.
fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_").replace("..", "_")
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (name, ""),
    }
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
