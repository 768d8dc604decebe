// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uploaded file records.

use crate::id::FileId;
use serde::{Deserialize, Serialize};

/// An uploaded file stored under the cloud's storage root.
///
/// Files are deduplicated by content digest: re-uploading identical bytes
/// returns the existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Original name as uploaded (before sanitization)
    pub name: String,
    /// On-disk storage path
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
    /// Hex SHA-256 of the content
    pub digest: String,
    pub created_at_ms: u64,
}
