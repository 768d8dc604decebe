// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn canonical_id_joins_env_and_hostname() {
    assert_eq!(canonical_agent_id("prod", "node-1"), "prod-node-1");
    assert_eq!(canonical_agent_id("", "node-1"), "node-1");
}

#[test]
fn canonical_id_is_stable() {
    let a = canonical_agent_id("staging", "web01");
    let b = canonical_agent_id("staging", "web01");
    assert_eq!(a, b);
}

#[test]
fn status_display_matches_wire_values() {
    assert_eq!(AgentStatus::Online.to_string(), "online");
    assert_eq!(AgentStatus::Offline.to_string(), "offline");
    assert_eq!(AgentStatus::Error.to_string(), "error");
    assert_eq!(
        serde_json::to_string(&AgentStatus::Online).unwrap(),
        "\"online\""
    );
}

#[test]
fn seen_recently_honors_online_window() {
    let mut agent = sample_agent();
    agent.last_seen_ms = Some(1_000_000);

    assert!(agent.seen_recently(1_000_000));
    assert!(agent.seen_recently(1_000_000 + ONLINE_WINDOW_MS));
    assert!(!agent.seen_recently(1_000_000 + ONLINE_WINDOW_MS + 1));

    agent.last_seen_ms = None;
    assert!(!agent.seen_recently(1_000_000));
}

#[test]
fn record_round_trips_through_json() {
    let agent = sample_agent();
    let json = serde_json::to_string(&agent).unwrap();
    let back: AgentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, agent.id);
    assert_eq!(back.protocol, "wss");
    assert_eq!(back.tags, vec!["db".to_string()]);
}

fn sample_agent() -> AgentRecord {
    AgentRecord {
        id: "prod-node-1".to_string(),
        name: "node-1".to_string(),
        hostname: "node-1".to_string(),
        ip: "10.0.0.5".to_string(),
        version: "1.0.0".to_string(),
        env: "prod".to_string(),
        protocol: "wss".to_string(),
        status: AgentStatus::Online,
        last_seen_ms: Some(42),
        tags: vec!["db".to_string()],
        metadata: HashMap::new(),
        created_at_ms: 1,
        updated_at_ms: 2,
    }
}
