// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform SQL-from-file preflight.
//!
//! Plugins that accept SQL from an uploaded file read `params.file_path`
//! (and `params.file_name` for archive member selection). A `.zip` path
//! yields the named member, or the first `.sql` entry when no name is
//! given; anything else is read as-is.

use super::ExecuteError;
use crate::logger::TaskLogger;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read SQL text for a task. Returns `None` when no file was attached.
pub async fn read_sql_from_file(
    file_id: Option<&str>,
    file_path: Option<&str>,
    file_name: Option<&str>,
    logger: &TaskLogger,
) -> Result<Option<String>, ExecuteError> {
    let Some(file_id) = file_id.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };

    let path = match file_path.filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => find_local_file(file_id).ok_or_else(|| {
            ExecuteError::Input(format!("file not found for file id {}", file_id))
        })?,
    };

    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|e| ExecuteError::Input(format!("file not found: {}: {}", path.display(), e)))?;
    if meta.is_dir() {
        return Err(ExecuteError::Input(format!(
            "path is a directory, not a file: {}",
            path.display()
        )));
    }

    let is_zip = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if is_zip {
        logger.info(format!("Reading SQL from zip file: {}", path.display()));
        let member = file_name.map(str::to_string);
        let (name, sql) = read_sql_from_zip(path.clone(), member).await?;
        logger.info(format!("Read {} bytes from zip member: {}", sql.len(), name));
        Ok(Some(sql))
    } else {
        logger.info(format!("Reading SQL from file: {}", path.display()));
        let sql = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ExecuteError::Input(format!("failed to read file: {}", e)))?;
        logger.info(format!("Read {} bytes from file", sql.len()));
        Ok(Some(sql))
    }
}

/// Fallback search when the dispatcher sent only a file id.
fn find_local_file(file_id: &str) -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(file_id)];
    if let Ok(wd) = std::env::current_dir() {
        for suffix in ["", ".zip", ".sql"] {
            candidates.push(wd.join("tmp").join(format!("{file_id}{suffix}")));
        }
    }
    for suffix in ["", ".zip", ".sql"] {
        candidates.push(Path::new("/tmp").join(format!("{file_id}{suffix}")));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Extract a SQL member from a zip archive. When `member` is `None`, the
/// first `.sql` entry wins.
async fn read_sql_from_zip(
    path: PathBuf,
    member: Option<String>,
) -> Result<(String, String), ExecuteError> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)
            .map_err(|e| ExecuteError::Input(format!("failed to open zip file: {}", e)))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExecuteError::Input(format!("failed to read zip file: {}", e)))?;

        let index = match &member {
            Some(wanted) => (0..archive.len()).find(|&i| {
                archive
                    .by_index(i)
                    .map(|f| {
                        f.name() == wanted
                            || Path::new(f.name())
                                .file_name()
                                .map(|n| n == wanted.as_str())
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
            }),
            None => (0..archive.len()).find(|&i| {
                archive
                    .by_index(i)
                    .map(|f| f.name().to_ascii_lowercase().ends_with(".sql"))
                    .unwrap_or(false)
            }),
        };

        let index = index.ok_or_else(|| match &member {
            Some(wanted) => ExecuteError::Input(format!("file {:?} not found in zip", wanted)),
            None => ExecuteError::Input("no .sql file found in zip".into()),
        })?;

        let mut entry = archive
            .by_index(index)
            .map_err(|e| ExecuteError::Input(format!("failed to open file in zip: {}", e)))?;
        let mut sql = String::new();
        entry
            .read_to_string(&mut sql)
            .map_err(|e| ExecuteError::Input(format!("failed to read file from zip: {}", e)))?;
        Ok((entry.name().to_string(), sql))
    })
    .await
    .map_err(|_| ExecuteError::Internal)?
}

#[cfg(test)]
#[path = "sql_file_tests.rs"]
mod tests;
