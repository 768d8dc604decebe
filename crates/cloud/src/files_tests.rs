// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::AgentRegistry;
use fc_wire::test_support::connection;
use fc_wire::{RegisterData, TaskCreateData};

fn fixture() -> (Arc<Store>, FileStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let files = FileStore::new(Arc::clone(&store), dir.path().join("files")).unwrap();
    (store, files, dir)
}

#[tokio::test]
async fn upload_writes_bytes_and_records_metadata() {
    let (_store, files, _dir) = fixture();

    let record = files
        .save_upload("dump.sql", "application/sql", b"SELECT 1;")
        .await
        .unwrap();

    assert_eq!(record.name, "dump.sql");
    assert_eq!(record.size, 9);
    assert_eq!(record.content_type, "application/sql");
    assert_eq!(record.digest.len(), 64);
    let on_disk = tokio::fs::read(&record.path).await.unwrap();
    assert_eq!(on_disk, b"SELECT 1;");
}

#[tokio::test]
async fn identical_content_is_deduplicated() {
    let (_store, files, _dir) = fixture();

    let first = files.save_upload("a.sql", "", b"SELECT 1;").await.unwrap();
    let second = files.save_upload("b.sql", "", b"SELECT 1;").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.path, second.path);
}

#[tokio::test]
async fn name_collisions_get_an_id_suffix() {
    let (_store, files, _dir) = fixture();

    let first = files.save_upload("run.sql", "", b"one").await.unwrap();
    let second = files.save_upload("run.sql", "", b"two").await.unwrap();

    assert_ne!(first.path, second.path);
    assert!(second.path.contains(&format!("run-{}", second.id.short(8))));
    assert!(second.path.ends_with(".sql"));
}

#[tokio::test]
async fn uploaded_names_are_sanitized() {
    let (_store, files, _dir) = fixture();

    let record = files
        .save_upload("../../etc/passwd", "", b"haha")
        .await
        .unwrap();

    // The original name is preserved in metadata, the stored path is inert.
    assert_eq!(record.name, "../../etc/passwd");
    let stored = std::path::Path::new(&record.path);
    assert!(stored.starts_with(files.root()));
    assert!(!stored.to_string_lossy().contains(".."));
}

#[tokio::test]
async fn empty_uploads_are_rejected() {
    let (_store, files, _dir) = fixture();
    assert!(matches!(
        files.save_upload("x", "", b"").await,
        Err(FileError::Empty)
    ));
}

#[tokio::test]
async fn distribute_creates_file_tasks_for_online_agents_only() {
    let (store, files, _dir) = fixture();
    let registry = Arc::new(AgentRegistry::new(Arc::clone(&store)));
    let tasks = TaskManager::new(Arc::clone(&store), Arc::clone(&registry));

    let (_conn, mut peer) = connection("ws");
    registry
        .register(
            _conn.clone(),
            &RegisterData {
                agent_id: "inst".into(),
                name: "n1".into(),
                hostname: "n1".into(),
                ip: "10.0.0.1".into(),
                version: "1".into(),
                env: String::new(),
                metadata: Default::default(),
            },
            "ws",
        )
        .unwrap();

    let record = files.save_upload("pkg.tgz", "", b"bytes").await.unwrap();
    let created = files
        .distribute(
            &tasks,
            &record.id,
            &["n1".to_string(), "offline-agent".to_string()],
            "/opt/drop",
        )
        .unwrap();

    assert_eq!(created.len(), 1);

    let frame = peer.next_message().await;
    let data: TaskCreateData = frame.parse_data().unwrap();
    let params = data.params.unwrap();
    assert_eq!(params["operation"], "distribute");
    assert_eq!(params["file_name"], "pkg.tgz");
    assert_eq!(params["target_path"], "/opt/drop");
    assert_eq!(data.file_id.as_deref(), Some(record.id.as_str()));
}
