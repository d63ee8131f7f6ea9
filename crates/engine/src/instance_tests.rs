// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{FakeClock, IssueType, NewIssue};
use fm_storage::Database;
use std::time::Duration;

fn setup() -> (tempfile::TempDir, Arc<Database>, FakeClock) {
    let dir = tempfile::TempDir::new().unwrap();
    let db = Arc::new(Database::open(dir.path()).unwrap());
    (dir, db, FakeClock::new())
}

fn config(id: &str) -> ExecutorConfig {
    ExecutorConfig {
        instance_id: Some(id.into()),
        hostname: "testhost".to_string(),
        version: "test".to_string(),
        heartbeat_interval: Duration::from_millis(10),
        stale_threshold: Duration::from_secs(300),
        sweep_interval: Duration::from_millis(10),
    }
}

#[test]
fn register_creates_running_row() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock).unwrap();

    let row = db.executor(&handle.id()).unwrap().unwrap();
    assert_eq!(row.status, fm_core::ExecutorStatus::Running);
    assert_eq!(row.hostname, "testhost");
    assert_eq!(row.pid, std::process::id());
}

#[test]
fn beat_refreshes_heartbeat() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock.clone()).unwrap();

    clock.advance(Duration::from_secs(30));
    handle.beat().unwrap();

    let row = db.executor(&handle.id()).unwrap().unwrap();
    assert_eq!(row.last_heartbeat_ms, clock.epoch_ms());
}

#[test]
fn beat_reregisters_when_row_vanished() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock.clone()).unwrap();

    {
        let conn = db_conn(&db);
        conn.execute("DELETE FROM executor_instances", []).unwrap();
    }
    handle.beat().unwrap();
    assert!(db.executor(&handle.id()).unwrap().is_some());
}

#[test]
fn shutdown_marks_stopped() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock).unwrap();
    handle.shutdown().unwrap();

    let row = db.executor(&handle.id()).unwrap().unwrap();
    assert_eq!(row.status, fm_core::ExecutorStatus::Stopped);
}

#[test]
fn sweep_once_releases_stale_peer() {
    let (_dir, db, clock) = setup();

    // A peer that heartbeated long ago and holds a claim.
    let peer = ExecutorHandle::register(Arc::clone(&db), config("exe-peer"), clock.clone()).unwrap();
    let new = NewIssue::new(IssueType::Task, "stuck work").acceptance_criteria("done");
    db.create_issue(&new, clock.epoch_ms()).unwrap();
    db.claim(&new.id, &peer.id(), clock.epoch_ms()).unwrap();

    clock.advance(Duration::from_secs(600));
    let me = ExecutorHandle::register(Arc::clone(&db), config("exe-me"), clock.clone()).unwrap();
    let outcome = me.sweep_once().unwrap();

    assert_eq!(outcome.released_issues, vec![new.id]);
    assert_eq!(outcome.crashed_executors, vec![peer.id()]);
}

#[tokio::test]
async fn heartbeat_loop_stops_on_cancel() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock).unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    let loop_token = token.clone();
    let task = tokio::spawn(async move { handle.heartbeat_loop(loop_token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop must exit after cancellation")
        .unwrap();
}

#[tokio::test]
async fn sweep_loop_stops_on_cancel() {
    let (_dir, db, clock) = setup();
    let handle = ExecutorHandle::register(Arc::clone(&db), config("exe-1"), clock).unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    let loop_token = token.clone();
    let task = tokio::spawn(async move { handle.sweep_loop(loop_token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop must exit after cancellation")
        .unwrap();
}

/// Direct connection for test-side surgery.
fn db_conn(db: &Database) -> rusqlite::Connection {
    rusqlite::Connection::open(db.path()).unwrap()
}
