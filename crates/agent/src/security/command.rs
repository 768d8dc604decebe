// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command validation against compiled allow/deny pattern sets.

use super::config::SecurityConfig;
use super::PolicyViolation;
use regex::Regex;

/// Compiled command policy. Deny wins over allow, and the deny-list is
/// consulted even when the whitelist is disabled.
pub struct CommandValidator {
    whitelist_enabled: bool,
    allowed: Vec<Regex>,
    blocked: Vec<Regex>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct PatternError {
    pattern: String,
    source: regex::Error,
}

impl CommandValidator {
    pub fn new(config: &SecurityConfig) -> Result<Self, PatternError> {
        let compile = |patterns: &[super::config::CommandPattern]| {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(&p.pattern).map_err(|source| PatternError {
                        pattern: p.pattern.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            whitelist_enabled: config.command_whitelist_enabled,
            allowed: compile(&config.allowed_commands)?,
            blocked: compile(&config.blocked_patterns)?,
        })
    }

    /// Validate a command line.
    ///
    /// 1. Deny-list match rejects, always.
    /// 2. With the whitelist enabled and non-empty, the command must match
    ///    at least one allowed pattern.
    pub fn validate(&self, command: &str) -> Result<(), PolicyViolation> {
        for pattern in &self.blocked {
            if pattern.is_match(command) {
                return Err(PolicyViolation(format!(
                    "command blocked by security policy: {:?} matches blocked pattern {:?}",
                    command,
                    pattern.as_str()
                )));
            }
        }

        if self.whitelist_enabled && !self.allowed.is_empty() {
            if self.allowed.iter().any(|p| p.is_match(command)) {
                return Ok(());
            }
            return Err(PolicyViolation(format!(
                "command not in whitelist: {:?}",
                command
            )));
        }

        Ok(())
    }

    pub fn whitelist_enabled(&self) -> bool {
        self.whitelist_enabled
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
