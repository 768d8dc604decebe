// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::security::config::CommandPattern;

fn config(
    whitelist_enabled: bool,
    allowed: &[&str],
    blocked: &[&str],
) -> SecurityConfig {
    let pattern = |p: &&str| CommandPattern {
        pattern: p.to_string(),
        description: String::new(),
        reason: String::new(),
    };
    SecurityConfig {
        command_whitelist_enabled: whitelist_enabled,
        allowed_commands: allowed.iter().map(pattern).collect(),
        blocked_patterns: blocked.iter().map(pattern).collect(),
    }
}

#[test]
fn empty_config_permits_everything() {
    let v = CommandValidator::new(&config(false, &[], &[])).unwrap();
    assert!(v.validate("rm -rf /").is_ok());
    assert!(v.validate("echo hi").is_ok());
}

#[test]
fn deny_list_applies_even_with_whitelist_disabled() {
    let v = CommandValidator::new(&config(false, &[], &[r".*\bsudo\b.*"])).unwrap();
    let err = v.validate("sudo ls").unwrap_err();
    assert!(err.0.contains("blocked pattern"));
    assert!(v.validate("ls").is_ok());
}

#[test]
fn deny_wins_over_allow() {
    let v = CommandValidator::new(&config(
        true,
        &[r"^sudo .*"], // explicitly allowed…
        &[r".*\bsudo\b.*"], // …but also denied
    ))
    .unwrap();
    assert!(v.validate("sudo ls").is_err());
}

#[test]
fn whitelist_requires_a_match() {
    let v = CommandValidator::new(&config(true, &[r"^echo .*", r"^kubectl get .*"], &[])).unwrap();
    assert!(v.validate("echo hi").is_ok());
    assert!(v.validate("kubectl get pods").is_ok());

    let err = v.validate("curl evil.example").unwrap_err();
    assert!(err.0.contains("not in whitelist"));
}

#[test]
fn whitelist_enabled_but_empty_behaves_like_deny_only() {
    let v = CommandValidator::new(&config(true, &[], &[r"\bshutdown\b"])).unwrap();
    assert!(v.validate("uptime").is_ok());
    assert!(v.validate("shutdown -h now").is_err());
}

#[test]
fn invalid_patterns_fail_construction() {
    let err = CommandValidator::new(&config(false, &[], &["("]));
    assert!(err.is_err());
}
