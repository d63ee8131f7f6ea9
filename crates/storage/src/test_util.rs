// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for storage tests.

use crate::Database;
use fm_core::{ExecutorId, ExecutorInstance, IssueId, IssueType, NewIssue};
use tempfile::TempDir;

/// Base timestamp used across storage tests.
pub(crate) const T0: u64 = 1_000_000;

/// Open a fresh database in a tempdir. Keep the dir alive for the test.
pub(crate) fn test_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path()).unwrap();
    (dir, db)
}

/// Create an open task with acceptance criteria at the given priority.
pub(crate) fn seed_task(db: &Database, id: &str, priority: i32) -> IssueId {
    let new = NewIssue::new(IssueType::Task, format!("task {id}"))
        .id(id)
        .acceptance_criteria("does the thing")
        .priority(priority);
    db.create_issue(&new, T0).unwrap();
    new.id
}

/// Register a running executor with a heartbeat at `now_ms`.
pub(crate) fn seed_executor(db: &Database, id: &str, now_ms: u64) -> ExecutorId {
    let instance = ExecutorInstance::builder()
        .id(id)
        .started_at_ms(now_ms)
        .last_heartbeat_ms(now_ms)
        .build();
    db.register_executor(&instance).unwrap();
    instance.id
}
