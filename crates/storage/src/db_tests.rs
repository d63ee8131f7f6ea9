// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_util::{seed_task, test_db};
use crate::{Database, StoreError};
use std::fs;

#[test]
fn open_creates_state_dir_and_db() {
    let (dir, db) = test_db();
    assert!(dir.path().join(".beads/foreman.db").exists());
    assert_eq!(db.path(), dir.path().join(".beads/foreman.db"));
}

#[test]
fn reopen_is_idempotent() {
    let (dir, db) = test_db();
    seed_task(&db, "vc-1", 1);
    drop(db);

    let db = Database::open(dir.path()).unwrap();
    let issue = db.issue(&"vc-1".into()).unwrap();
    assert!(issue.is_some());
}

#[test]
fn close_poisons_the_handle() {
    let (_dir, db) = test_db();
    db.close();

    let err = db.issue(&"vc-1".into()).unwrap_err();
    assert!(matches!(err, StoreError::Closed));
    let err = db.list_executors().unwrap_err();
    assert!(matches!(err, StoreError::Closed));
}

#[test]
fn fresh_export_passes_the_guard() {
    let (dir, db) = test_db();
    seed_task(&db, "vc-1", 1);
    drop(db);

    // Export older than the database: fine.
    let export = dir.path().join(".beads/issues.jsonl");
    fs::write(&export, "{}\n").unwrap();
    let old = filetime_from_secs(1_000_000_000);
    set_mtime(&export, old);

    assert!(Database::open(dir.path()).is_ok());
}

#[test]
fn leading_export_fails_startup() {
    let (dir, db) = test_db();
    seed_task(&db, "vc-1", 1);
    drop(db);

    // Push the database files far into the past, then write the export.
    let beads = dir.path().join(".beads");
    let old = filetime_from_secs(1_000_000_000);
    for name in ["foreman.db", "foreman.db-wal", "foreman.db-shm"] {
        let p = beads.join(name);
        if p.exists() {
            set_mtime(&p, old);
        }
    }
    fs::write(beads.join("issues.jsonl"), "{}\n").unwrap();

    let err = Database::open(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::StaleExport { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("re-import"), "message should instruct re-import: {msg}");
}

#[test]
fn export_without_database_fails_startup() {
    let dir = tempfile::TempDir::new().unwrap();
    let beads = dir.path().join(".beads");
    fs::create_dir_all(&beads).unwrap();
    fs::write(beads.join("issues.jsonl"), "{}\n").unwrap();

    let err = Database::open(dir.path()).unwrap_err();
    assert!(matches!(err, StoreError::StaleExport { .. }));
}

fn filetime_from_secs(secs: u64) -> std::time::SystemTime {
    std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs)
}

fn set_mtime(path: &std::path::Path, to: std::time::SystemTime) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(to).unwrap();
}
