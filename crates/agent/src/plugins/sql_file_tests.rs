// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::logger::TaskLogger;
use fc_core::TaskId;
use std::io::Write;

fn logger() -> TaskLogger {
    TaskLogger::channel(TaskId::from_string("t1")).0
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options: zip::write::SimpleFileOptions = Default::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[tokio::test]
async fn no_file_id_yields_none() {
    let got = read_sql_from_file(None, None, None, &logger()).await.unwrap();
    assert!(got.is_none());
    let got = read_sql_from_file(Some(""), None, None, &logger())
        .await
        .unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn plain_files_are_read_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("migration.sql");
    std::fs::write(&path, "SELECT 1;\nSELECT 2;").unwrap();

    let got = read_sql_from_file(
        Some("f1"),
        Some(path.to_str().unwrap()),
        Some("migration.sql"),
        &logger(),
    )
    .await
    .unwrap();
    assert_eq!(got.as_deref(), Some("SELECT 1;\nSELECT 2;"));
}

#[tokio::test]
async fn zip_without_member_name_takes_the_first_sql_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    write_zip(
        &path,
        &[
            ("README.md", "docs"),
            ("001_init.sql", "CREATE TABLE a (id INT);"),
            ("002_more.sql", "CREATE TABLE b (id INT);"),
        ],
    );

    let got = read_sql_from_file(Some("f1"), Some(path.to_str().unwrap()), None, &logger())
        .await
        .unwrap();
    assert_eq!(got.as_deref(), Some("CREATE TABLE a (id INT);"));
}

#[tokio::test]
async fn zip_member_is_selected_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    write_zip(
        &path,
        &[
            ("sql/001_init.sql", "one"),
            ("sql/002_more.sql", "two"),
        ],
    );

    let got = read_sql_from_file(
        Some("f1"),
        Some(path.to_str().unwrap()),
        Some("002_more.sql"),
        &logger(),
    )
    .await
    .unwrap();
    assert_eq!(got.as_deref(), Some("two"));
}

#[tokio::test]
async fn zip_without_sql_entries_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");
    write_zip(&path, &[("notes.txt", "nope")]);

    let err = read_sql_from_file(Some("f1"), Some(path.to_str().unwrap()), None, &logger())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}

#[tokio::test]
async fn missing_path_is_an_input_error() {
    let err = read_sql_from_file(
        Some("f1"),
        Some("/definitely/not/here.sql"),
        None,
        &logger(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ExecuteError::Input(_)));
}
