// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed persistent store.
//!
//! A single connection in WAL mode behind a mutex; every public method is one
//! short transaction. Structured columns (tags, metadata, params) are stored
//! as JSON text.

use fc_core::{
    epoch_ms_now, AgentRecord, AgentStatus, FileId, FileRecord, LogLevel, LogRecord, Task, TaskId,
    TaskStatus, TaskType,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;

/// Errors from the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("corrupt column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Embedded SQL store for agents, tasks, logs, and files.
pub struct Store {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    hostname      TEXT NOT NULL DEFAULT '',
    ip            TEXT NOT NULL DEFAULT '',
    version       TEXT NOT NULL DEFAULT '',
    env           TEXT NOT NULL DEFAULT '',
    protocol      TEXT NOT NULL DEFAULT 'ws',
    status        TEXT NOT NULL DEFAULT 'offline',
    last_seen_ms  INTEGER,
    tags          TEXT NOT NULL DEFAULT '[]',
    metadata      TEXT NOT NULL DEFAULT '{}',
    created_at_ms INTEGER NOT NULL,
    updated_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agents_env_hostname ON agents(env, hostname);

CREATE TABLE IF NOT EXISTS tasks (
    id             TEXT PRIMARY KEY,
    agent_id       TEXT NOT NULL,
    type           TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending',
    command        TEXT NOT NULL DEFAULT '',
    params         TEXT,
    file_id        TEXT,
    result         TEXT NOT NULL DEFAULT '',
    error          TEXT NOT NULL DEFAULT '',
    started_at_ms  INTEGER,
    finished_at_ms INTEGER,
    created_at_ms  INTEGER NOT NULL,
    updated_at_ms  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_agent ON tasks(agent_id);
CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at_ms);

CREATE TABLE IF NOT EXISTS logs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id   TEXT NOT NULL,
    level     TEXT NOT NULL,
    message   TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_task ON logs(task_id);

CREATE TABLE IF NOT EXISTS files (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    path          TEXT NOT NULL,
    size          INTEGER NOT NULL DEFAULT 0,
    content_type  TEXT NOT NULL DEFAULT '',
    digest        TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_digest ON files(digest);
";

impl Store {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // === Agents ===

    pub fn create_agent(&self, agent: &AgentRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agents (id, name, hostname, ip, version, env, protocol, status,
                                 last_seen_ms, tags, metadata, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                agent.id,
                agent.name,
                agent.hostname,
                agent.ip,
                agent.version,
                agent.env,
                agent.protocol,
                agent.status.to_string(),
                agent.last_seen_ms,
                serde_json::to_string(&agent.tags).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&agent.metadata).unwrap_or_else(|_| "{}".into()),
                agent.created_at_ms,
                agent.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<AgentRecord, StoreError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM agents WHERE id = ?1", [id], agent_from_row)
            .optional()?
            .ok_or_else(|| StoreError::AgentNotFound(id.to_string()))
    }

    pub fn get_agent_by_env_hostname(
        &self,
        env: &str,
        hostname: &str,
    ) -> Result<Option<AgentRecord>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT * FROM agents WHERE env = ?1 AND hostname = ?2",
                params![env, hostname],
                agent_from_row,
            )
            .optional()?)
    }

    pub fn update_agent(&self, agent: &AgentRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE agents SET name = ?2, hostname = ?3, ip = ?4, version = ?5, env = ?6,
                               protocol = ?7, status = ?8, last_seen_ms = ?9, tags = ?10,
                               metadata = ?11, updated_at_ms = ?12
             WHERE id = ?1",
            params![
                agent.id,
                agent.name,
                agent.hostname,
                agent.ip,
                agent.version,
                agent.env,
                agent.protocol,
                agent.status.to_string(),
                agent.last_seen_ms,
                serde_json::to_string(&agent.tags).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&agent.metadata).unwrap_or_else(|_| "{}".into()),
                epoch_ms_now(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::AgentNotFound(agent.id.clone()));
        }
        Ok(())
    }

    pub fn update_agent_status(&self, id: &str, status: AgentStatus) -> Result<(), StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE agents SET status = ?2, last_seen_ms = ?3, updated_at_ms = ?3 WHERE id = ?1",
            params![id, status.to_string(), now],
        )?;
        Ok(())
    }

    pub fn list_agents(&self) -> Result<Vec<AgentRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM agents ORDER BY id")?;
        let rows = stmt.query_map([], agent_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn delete_agent(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM agents WHERE id = ?1", [id])?;
        Ok(())
    }

    // === Tasks ===

    pub fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tasks (id, agent_id, type, status, command, params, file_id, result,
                                error, started_at_ms, finished_at_ms, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id.as_str(),
                task.agent_id,
                task.task_type.as_str(),
                task.status.as_str(),
                task.command,
                task.params
                    .as_ref()
                    .map(|p| serde_json::to_string(p).unwrap_or_default()),
                task.file_id.as_ref().map(|f| f.as_str()),
                task.result,
                task.error,
                task.started_at_ms,
                task.finished_at_ms,
                task.created_at_ms,
                task.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Task, StoreError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM tasks WHERE id = ?1", [id], task_from_row)
            .optional()?
            .transpose()?
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))
    }

    pub fn list_tasks(
        &self,
        agent_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.lock();
        let mut out = Vec::new();
        match agent_id {
            Some(agent) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE agent_id = ?1
                     ORDER BY created_at_ms DESC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![agent, limit, offset], task_from_row)?;
                for row in rows {
                    out.push(row??);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks ORDER BY created_at_ms DESC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt.query_map(params![limit, offset], task_from_row)?;
                for row in rows {
                    out.push(row??);
                }
            }
        }
        Ok(out)
    }

    /// Move a task to `status`, stamping `started_at_ms`/`finished_at_ms` as
    /// appropriate. Terminal rows are frozen: the update only applies from
    /// `pending` or `running`, and returns whether a row changed.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        let changed = match status {
            TaskStatus::Running => conn.execute(
                "UPDATE tasks SET status = ?2, started_at_ms = ?3, updated_at_ms = ?3
                 WHERE id = ?1 AND status = 'pending'",
                params![id, status.as_str(), now],
            )?,
            s if s.is_terminal() => conn.execute(
                "UPDATE tasks SET status = ?2, finished_at_ms = ?3, updated_at_ms = ?3
                 WHERE id = ?1 AND status IN ('pending', 'running')",
                params![id, status.as_str(), now],
            )?,
            _ => 0,
        };
        Ok(changed > 0)
    }

    /// Patch the terminal fields reported by the agent. Idempotent on task
    /// id; a task already in a terminal state is left untouched.
    pub fn complete_task(
        &self,
        id: &str,
        status: TaskStatus,
        result: &str,
        error: &str,
    ) -> Result<bool, StoreError> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE tasks SET status = ?2, result = ?3, error = ?4, finished_at_ms = ?5,
                              updated_at_ms = ?5
             WHERE id = ?1 AND status IN ('pending', 'running')",
            params![id, status.as_str(), result, error, now],
        )?;
        Ok(changed > 0)
    }

    // === Logs ===

    pub fn create_log(&self, log: &LogRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO logs (task_id, level, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                log.task_id.as_str(),
                log.level.to_string(),
                log.message,
                log.timestamp
            ],
        )?;
        Ok(())
    }

    /// Logs for a task in timestamp order (insertion order within a second).
    pub fn get_task_logs(&self, task_id: &str, limit: u32) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT task_id, level, message, timestamp FROM logs
             WHERE task_id = ?1 ORDER BY timestamp ASC, id ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![task_id, limit], |row| {
            let level: String = row.get(1)?;
            Ok((row.get::<_, String>(0)?, level, row.get::<_, String>(2)?, row.get::<_, i64>(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (task_id, level, message, timestamp) = row?;
            let level = LogLevel::from_str(&level).map_err(|_| StoreError::Corrupt {
                column: "logs.level",
                value: level.clone(),
            })?;
            out.push(LogRecord {
                task_id: TaskId::from_string(task_id),
                level,
                message,
                timestamp,
            });
        }
        Ok(out)
    }

    // === Files ===

    pub fn create_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO files (id, name, path, size, content_type, digest, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.id.as_str(),
                file.name,
                file.path,
                file.size,
                file.content_type,
                file.digest,
                file.created_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn get_file(&self, id: &str) -> Result<FileRecord, StoreError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM files WHERE id = ?1", [id], file_from_row)
            .optional()?
            .ok_or_else(|| StoreError::FileNotFound(id.to_string()))
    }

    pub fn get_file_by_digest(&self, digest: &str) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT * FROM files WHERE digest = ?1",
                [digest],
                file_from_row,
            )
            .optional()?)
    }

    pub fn list_files(&self, limit: u32, offset: u32) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM files ORDER BY created_at_ms DESC LIMIT ?1 OFFSET ?2")?;
        let rows = stmt.query_map(params![limit, offset], file_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    let status: String = row.get("status")?;
    let tags: String = row.get("tags")?;
    let metadata: String = row.get("metadata")?;
    Ok(AgentRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        hostname: row.get("hostname")?,
        ip: row.get("ip")?,
        version: row.get("version")?,
        env: row.get("env")?,
        protocol: row.get("protocol")?,
        status: match status.as_str() {
            "online" => AgentStatus::Online,
            "error" => AgentStatus::Error,
            _ => AgentStatus::Offline,
        },
        last_seen_ms: row.get("last_seen_ms")?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at_ms: row.get("created_at_ms")?,
        updated_at_ms: row.get("updated_at_ms")?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Result<Task, StoreError>> {
    let task_type: String = row.get("type")?;
    let status: String = row.get("status")?;
    let params_text: Option<String> = row.get("params")?;

    let Ok(task_type) = TaskType::from_str(&task_type) else {
        return Ok(Err(StoreError::Corrupt {
            column: "tasks.type",
            value: task_type,
        }));
    };
    let Ok(status) = TaskStatus::from_str(&status) else {
        return Ok(Err(StoreError::Corrupt {
            column: "tasks.status",
            value: status,
        }));
    };

    Ok(Ok(Task {
        id: TaskId::from_string(row.get::<_, String>("id")?),
        agent_id: row.get("agent_id")?,
        task_type,
        status,
        command: row.get("command")?,
        params: params_text.and_then(|p| serde_json::from_str(&p).ok()),
        file_id: row
            .get::<_, Option<String>>("file_id")?
            .map(FileId::from_string),
        result: row.get("result")?,
        error: row.get("error")?,
        started_at_ms: row.get("started_at_ms")?,
        finished_at_ms: row.get("finished_at_ms")?,
        created_at_ms: row.get("created_at_ms")?,
        updated_at_ms: row.get("updated_at_ms")?,
    }))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: FileId::from_string(row.get::<_, String>("id")?),
        name: row.get("name")?,
        path: row.get("path")?,
        size: row.get("size")?,
        content_type: row.get("content_type")?,
        digest: row.get("digest")?,
        created_at_ms: row.get("created_at_ms")?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
