// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security configuration loading.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One allow or deny pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPattern {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    /// Why a blocked pattern exists; echoed in rejections
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Agent security policy, loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// When enabled, commands must match at least one allowed pattern.
    #[serde(default)]
    pub command_whitelist_enabled: bool,

    #[serde(default)]
    pub allowed_commands: Vec<CommandPattern>,

    /// Deny patterns; consulted even when the whitelist is disabled.
    #[serde(default)]
    pub blocked_patterns: Vec<CommandPattern>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read security config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse security config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl SecurityConfig {
    /// Load from a YAML file.
    ///
    /// An empty path or a missing file yields the permissive default — with
    /// a conspicuous warning, since every command will be allowed until a
    /// policy is configured. The deny-list machinery stays wired either way.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if path.is_empty() {
            tracing::warn!(
                "no security config path set; ALL commands will be allowed — this is insecure"
            );
            return Ok(Self::default());
        }

        match std::fs::read_to_string(Path::new(path)) {
            Ok(data) => {
                let config: Self = serde_yaml::from_str(&data)?;
                tracing::info!(path, "loaded security config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path,
                    "security config not found; ALL commands will be allowed — this is insecure"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_permissive_default() {
        let config = SecurityConfig::load("/nonexistent/security.yaml").unwrap();
        assert!(!config.command_whitelist_enabled);
        assert!(config.allowed_commands.is_empty());
        assert!(config.blocked_patterns.is_empty());
    }

    #[test]
    fn yaml_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"command_whitelist_enabled: true
allowed_commands:
- pattern: '^kubectl .*'
  description: kubectl
blocked_patterns:
- pattern: '.*\brm -rf\b.*'
  reason: destructive"#
        )
        .unwrap();

        let config = SecurityConfig::load(file.path().to_str().unwrap()).unwrap();
        assert!(config.command_whitelist_enabled);
        assert_eq!(config.allowed_commands.len(), 1);
        assert_eq!(config.blocked_patterns[0].reason, "destructive");
    }
}
