// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fc_core::ONLINE_WINDOW_MS;
use fc_storage::Store;
use fc_wire::test_support::connection;
use fc_wire::MessageType;

fn registry() -> AgentRegistry {
    AgentRegistry::new(Arc::new(Store::open_in_memory().unwrap()))
}

fn register_data(env: &str, hostname: &str) -> RegisterData {
    RegisterData {
        agent_id: "instance-uuid".into(),
        name: hostname.into(),
        hostname: hostname.into(),
        ip: "10.0.0.1".into(),
        version: "1.0.0".into(),
        env: env.into(),
        metadata: Default::default(),
    }
}

#[tokio::test]
async fn register_derives_canonical_id() {
    let reg = registry();
    let (conn, _peer) = connection("ws");

    let id = reg.register(conn, &register_data("prod", "node-1"), "ws").unwrap();
    assert_eq!(id, "prod-node-1");

    let (conn2, _peer2) = connection("ws");
    let id2 = reg
        .register(conn2, &register_data("", "node-2"), "ws")
        .unwrap();
    assert_eq!(id2, "node-2");
}

#[tokio::test]
async fn same_env_hostname_always_yields_the_same_id() {
    let reg = registry();

    let (c1, _p1) = connection("ws");
    let first = reg.register(c1, &register_data("prod", "node-1"), "ws").unwrap();

    let (c2, _p2) = connection("wss");
    let second = reg
        .register(c2, &register_data("prod", "node-1"), "wss")
        .unwrap();

    assert_eq!(first, second);
    // The re-register updated mutable fields.
    let agents = reg.list().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].protocol, "wss");
}

#[tokio::test]
async fn reregistration_closes_the_previous_connection() {
    let reg = registry();

    let (old, _old_peer) = connection("ws");
    reg.register(Arc::clone(&old), &register_data("prod", "node-1"), "ws")
        .unwrap();
    assert!(!old.is_closed());

    let (new, _new_peer) = connection("ws");
    reg.register(Arc::clone(&new), &register_data("prod", "node-1"), "ws")
        .unwrap();

    old.closed().await;
    assert!(old.is_closed());
    assert!(!new.is_closed());

    // The live connection is the new one.
    let live = reg.get_connection("prod-node-1").unwrap();
    assert!(live.same_as(&new));
}

#[tokio::test]
async fn send_reaches_the_connection() {
    let reg = registry();
    let (conn, mut peer) = connection("ws");
    reg.register(conn, &register_data("", "n1"), "ws").unwrap();

    reg.send("n1", Message::bare(MessageType::TaskCreate)).unwrap();
    let got = peer.next_message().await;
    assert_eq!(got.msg_type, MessageType::TaskCreate);
}

#[tokio::test]
async fn send_to_unknown_agent_is_not_connected() {
    let reg = registry();
    let err = reg.send("ghost", Message::bare(MessageType::TaskCreate));
    assert!(matches!(err, Err(RegistryError::NotConnected(_))));
}

#[tokio::test]
async fn send_on_closed_connection_unregisters() {
    let reg = registry();
    let (conn, _peer) = connection("ws");
    reg.register(Arc::clone(&conn), &register_data("", "n1"), "ws")
        .unwrap();

    conn.close();
    let err = reg.send("n1", Message::bare(MessageType::TaskCreate));
    assert!(matches!(err, Err(RegistryError::ConnectionClosed(_))));
    assert!(reg.get_connection("n1").is_none());
}

#[tokio::test]
async fn list_computes_status_from_connection_and_window() {
    let reg = registry();
    let (conn, _peer) = connection("ws");
    reg.register(conn, &register_data("", "live"), "ws").unwrap();

    // An agent with no connection and a stale heartbeat.
    let stale = {
        let mut a = reg.list().unwrap().into_iter().next().unwrap();
        a.id = "stale".into();
        a.hostname = "stale".into();
        a.env = "old".into();
        a.last_seen_ms = Some(epoch_ms_now() - ONLINE_WINDOW_MS - 1000);
        a
    };
    reg.store.create_agent(&stale).unwrap();

    // And one whose heartbeat is recent even though its socket is gone.
    let mut fresh = stale.clone();
    fresh.id = "fresh".into();
    fresh.hostname = "fresh".into();
    fresh.last_seen_ms = Some(epoch_ms_now());
    reg.store.create_agent(&fresh).unwrap();

    let agents = reg.list().unwrap();
    let status_of = |id: &str| {
        agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.status)
            .unwrap()
    };
    assert_eq!(status_of("live"), fc_core::AgentStatus::Online);
    assert_eq!(status_of("stale"), fc_core::AgentStatus::Offline);
    assert_eq!(status_of("fresh"), fc_core::AgentStatus::Online);
}

#[tokio::test]
async fn unregister_connection_ignores_displaced_sockets() {
    let reg = registry();

    let (old, _p1) = connection("ws");
    reg.register(Arc::clone(&old), &register_data("", "n1"), "ws")
        .unwrap();

    let (new, _p2) = connection("ws");
    reg.register(Arc::clone(&new), &register_data("", "n1"), "ws")
        .unwrap();

    // The displaced socket's ingress loop winds down and reports the close;
    // the fresh registration must survive it.
    reg.unregister_connection("n1", &old);
    assert!(reg.get_connection("n1").is_some());

    // A close of the live socket does unregister.
    reg.unregister_connection("n1", &new);
    assert!(reg.get_connection("n1").is_none());
}

#[tokio::test]
async fn delete_removes_registry_and_store_rows() {
    let reg = registry();
    let (conn, _peer) = connection("ws");
    reg.register(Arc::clone(&conn), &register_data("", "n1"), "ws")
        .unwrap();

    reg.delete("n1").unwrap();
    conn.closed().await;
    assert!(conn.is_closed());
    assert!(reg.get_connection("n1").is_none());
    assert!(reg.list().unwrap().is_empty());
}

#[tokio::test]
async fn heartbeat_refreshes_last_seen() {
    let reg = registry();
    let (conn, _peer) = connection("ws");
    reg.register(conn, &register_data("", "n1"), "ws").unwrap();

    let before = reg.list().unwrap()[0].last_seen_ms.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    reg.heartbeat("n1");
    let after = reg.list().unwrap()[0].last_seen_ms.unwrap();
    assert!(after >= before);
}

#[tokio::test]
async fn update_tags_replaces_and_persists() {
    let reg = registry();
    let (conn, _peer) = connection("ws");
    reg.register(conn, &register_data("", "n1"), "ws").unwrap();

    let updated = reg
        .update_tags("n1", vec!["db".into(), "edge".into()])
        .unwrap();
    assert_eq!(updated.tags, vec!["db".to_string(), "edge".to_string()]);
    assert_eq!(reg.list().unwrap()[0].tags.len(), 2);
}

#[tokio::test]
async fn concurrent_duplicate_registers_leave_one_live_connection() {
    let reg = Arc::new(registry());

    let (c1, _p1) = connection("ws");
    let (c2, _p2) = connection("ws");

    let r1 = {
        let reg = Arc::clone(&reg);
        let c1 = Arc::clone(&c1);
        tokio::spawn(async move { reg.register(c1, &register_data("prod", "dup"), "ws") })
    };
    let r2 = {
        let reg = Arc::clone(&reg);
        let c2 = Arc::clone(&c2);
        tokio::spawn(async move { reg.register(c2, &register_data("prod", "dup"), "ws") })
    };

    let id1 = r1.await.unwrap().unwrap();
    let id2 = r2.await.unwrap().unwrap();
    assert_eq!(id1, "prod-dup");
    assert_eq!(id2, "prod-dup");

    // Exactly one socket survives as the live connection; the other is closed.
    let live = reg.get_connection("prod-dup").unwrap();
    assert_eq!(c1.is_closed() as u8 + c2.is_closed() as u8, 1);
    assert!(live.same_as(&c1) || live.same_as(&c2));
    let loser = if live.same_as(&c1) { &c2 } else { &c1 };
    assert!(loser.is_closed());
}
