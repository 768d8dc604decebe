// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQL and document-store operation screening.
//!
//! Statements are normalized (comments stripped, whitespace collapsed,
//! upper-cased) before matching, with word-boundary patterns so `DROPPED`
//! never trips the `DROP TABLE` rule.

use super::PolicyViolation;
use regex::Regex;
use std::sync::OnceLock;

/// SQL statement validator with optional dangerous-operation allowance and
/// strict single-statement mode.
pub struct SqlValidator {
    allow_dangerous_ops: bool,
    strict_mode: bool,
}

const DANGEROUS_OPS: &[(&str, &str)] = &[
    ("DROP DATABASE", "DROP DATABASE operation is not allowed"),
    ("DROP SCHEMA", "DROP SCHEMA operation is not allowed"),
    ("DROP TABLE", "DROP TABLE operation is not allowed"),
    ("DROP VIEW", "DROP VIEW operation is not allowed"),
    ("DROP FUNCTION", "DROP FUNCTION operation is not allowed"),
    ("DROP PROCEDURE", "DROP PROCEDURE operation is not allowed"),
    ("DROP TRIGGER", "DROP TRIGGER operation is not allowed"),
    ("DROP INDEX", "DROP INDEX operation is not allowed"),
    ("DROP USER", "DROP USER operation is not allowed"),
    ("DROP ROLE", "DROP ROLE operation is not allowed"),
    ("TRUNCATE", "TRUNCATE operation is not allowed"),
    ("ALTER SYSTEM", "ALTER SYSTEM operation is not allowed"),
    ("ALTER DATABASE", "ALTER DATABASE operation is not allowed"),
    ("COPY FROM", "COPY FROM operation is not allowed"),
    ("CREATE USER", "CREATE USER operation is not allowed"),
    ("CREATE ROLE", "CREATE ROLE operation is not allowed"),
    ("GRANT", "GRANT operation is not allowed"),
    ("REVOKE", "REVOKE operation is not allowed"),
];

const INJECTION_PATTERNS: &[(&str, &str)] = &[
    (
        r";\s*(DROP|DELETE|TRUNCATE|ALTER)",
        "suspicious SQL injection pattern: multiple statements",
    ),
    (
        r"UNION.*SELECT",
        "suspicious SQL injection pattern: UNION SELECT",
    ),
    (
        r"EXEC\s*\(",
        "suspicious SQL injection pattern: EXEC function",
    ),
    (
        r"EXECUTE\s*\(",
        "suspicious SQL injection pattern: EXECUTE function",
    ),
    (
        r"XP_CMDSHELL",
        "suspicious SQL injection pattern: xp_cmdshell",
    ),
    (
        r"SP_EXECUTESQL",
        "suspicious SQL injection pattern: sp_executesql",
    ),
];

fn dangerous_regexes() -> &'static Vec<(Regex, &'static str)> {
    static CACHE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    CACHE.get_or_init(|| {
        DANGEROUS_OPS
            .iter()
            .map(|(keyword, message)| {
                let pattern = format!(r"\b{}\b", regex::escape(keyword));
                (Regex::new(&pattern).expect("static pattern"), *message)
            })
            .collect()
    })
}

fn injection_regexes() -> &'static Vec<(Regex, &'static str)> {
    static CACHE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    CACHE.get_or_init(|| {
        INJECTION_PATTERNS
            .iter()
            .map(|(pattern, message)| (Regex::new(pattern).expect("static pattern"), *message))
            .collect()
    })
}

impl SqlValidator {
    pub fn new(allow_dangerous_ops: bool, strict_mode: bool) -> Self {
        Self {
            allow_dangerous_ops,
            strict_mode,
        }
    }

    /// Screen a (possibly multi-statement) SQL text.
    pub fn validate(&self, sql: &str) -> Result<(), PolicyViolation> {
        if sql.trim().is_empty() {
            return Err(PolicyViolation("SQL statement is empty".into()));
        }

        let normalized = normalize(sql);

        if !self.allow_dangerous_ops {
            for (re, message) in dangerous_regexes() {
                if re.is_match(&normalized) {
                    return Err(PolicyViolation((*message).to_string()));
                }
            }
        }

        if self.strict_mode {
            self.strict_checks(&normalized)?;
        }

        for (re, message) in injection_regexes() {
            if re.is_match(&normalized) {
                return Err(PolicyViolation((*message).to_string()));
            }
        }

        Ok(())
    }

    fn strict_checks(&self, normalized: &str) -> Result<(), PolicyViolation> {
        if normalized.matches(';').count() > 1 {
            return Err(PolicyViolation(
                "strict mode: only single SQL statement is allowed".into(),
            ));
        }

        static CALL_RE: OnceLock<Regex> = OnceLock::new();
        let call = CALL_RE
            .get_or_init(|| Regex::new(r"\bCALL\b|\bEXEC\b|\bEXECUTE\b").expect("static pattern"));
        if call.is_match(normalized) {
            return Err(PolicyViolation(
                "strict mode: stored procedure calls are not allowed".into(),
            ));
        }
        Ok(())
    }

    /// Validate one MongoDB operation object.
    pub fn validate_mongo_operation(
        &self,
        operation: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PolicyViolation> {
        let Some(op_type) = operation.get("operation").and_then(|v| v.as_str()) else {
            return Err(PolicyViolation("operation type is required".into()));
        };

        const ALLOWED: &[&str] = &["insert", "update", "delete", "find"];
        if !ALLOWED.contains(&op_type) {
            return Err(PolicyViolation(format!(
                "unsupported operation type: {}",
                op_type
            )));
        }

        if let Some(collection) = operation.get("collection").and_then(|v| v.as_str()) {
            validate_collection_name(collection)?;
        }

        if let Some(filter) = operation.get("filter").and_then(|v| v.as_object()) {
            if filter.contains_key("$where") {
                return Err(PolicyViolation(
                    "$where operator is not allowed (potential injection risk)".into(),
                ));
            }
            if self.strict_mode && filter.contains_key("$expr") {
                return Err(PolicyViolation(
                    "strict mode: $expr operator is not allowed".into(),
                ));
            }
        }

        Ok(())
    }

    /// Validate one Elasticsearch operation object.
    pub fn validate_es_operation(
        &self,
        operation: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PolicyViolation> {
        let Some(op_type) = operation.get("operation").and_then(|v| v.as_str()) else {
            return Err(PolicyViolation("operation type is required".into()));
        };

        const ALLOWED: &[&str] = &["bulk", "update", "delete_by_query", "index", "search"];
        if !ALLOWED.contains(&op_type) {
            return Err(PolicyViolation(format!(
                "unsupported operation type: {}",
                op_type
            )));
        }

        if let Some(index) = operation.get("index").and_then(|v| v.as_str()) {
            validate_index_name(index)?;
        }

        Ok(())
    }
}

/// Strip comments, collapse whitespace, upper-case.
fn normalize(sql: &str) -> String {
    static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
    static BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let line = LINE_COMMENT.get_or_init(|| Regex::new(r"--[^\n]*").expect("static pattern"));
    let block =
        BLOCK_COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("static pattern"));
    let ws = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"));

    let sql = line.replace_all(sql, "");
    let sql = block.replace_all(&sql, "");
    let sql = ws.replace_all(&sql, " ");
    sql.trim().to_uppercase()
}

fn validate_collection_name(name: &str) -> Result<(), PolicyViolation> {
    if name.is_empty() {
        return Err(PolicyViolation("collection name cannot be empty".into()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(PolicyViolation(
            "invalid collection name: contains path traversal characters".into(),
        ));
    }
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static pattern"));
    if !re.is_match(name) {
        return Err(PolicyViolation(
            "invalid collection name: contains invalid characters".into(),
        ));
    }
    Ok(())
}

fn validate_index_name(name: &str) -> Result<(), PolicyViolation> {
    if name.is_empty() {
        return Err(PolicyViolation("index name cannot be empty".into()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(PolicyViolation(
            "invalid index name: contains path traversal characters".into(),
        ));
    }
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("static pattern"));
    if !re.is_match(name) {
        return Err(PolicyViolation(
            "invalid index name: contains invalid characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
