// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_util::{seed_executor, seed_task, test_db, T0};
use crate::StoreError;
use fm_core::{ExecutionPhase, ExecutorInstance, ExecutorStatus};

#[test]
fn register_and_fetch() {
    let (_dir, db) = test_db();
    let instance = ExecutorInstance::builder()
        .id("exe-1")
        .hostname("worker-a")
        .pid(31337)
        .build();
    db.register_executor(&instance).unwrap();

    let fetched = db.executor(&instance.id).unwrap().unwrap();
    assert_eq!(fetched, instance);
}

#[test]
fn reregistration_preserves_claims() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();

    // Clean restart with the same instance id: upsert, not delete+insert.
    let restarted = ExecutorInstance::builder()
        .id("exe-1")
        .pid(999)
        .started_at_ms(T0 + 5000)
        .last_heartbeat_ms(T0 + 5000)
        .build();
    db.register_executor(&restarted).unwrap();

    let row = db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.executor, Some(exec), "claim ownership must survive re-registration");
    assert_eq!(row.phase, ExecutionPhase::Claimed);

    let fetched = db.executor(&exec).unwrap().unwrap();
    assert_eq!(fetched.pid, 999);
    assert_eq!(fetched.last_heartbeat_ms, T0 + 5000);
}

#[test]
fn heartbeat_updates_only_known_executors() {
    let (_dir, db) = test_db();
    let exec = seed_executor(&db, "exe-1", T0);

    db.heartbeat(&exec, T0 + 100).unwrap();
    assert_eq!(db.executor(&exec).unwrap().unwrap().last_heartbeat_ms, T0 + 100);

    let err = db.heartbeat(&"exe-ghost".into(), T0).unwrap_err();
    assert!(matches!(err, StoreError::ExecutorNotFound { .. }));
}

#[test]
fn mark_stopped() {
    let (_dir, db) = test_db();
    let exec = seed_executor(&db, "exe-1", T0);
    db.mark_executor_stopped(&exec, T0 + 1).unwrap();
    assert_eq!(db.executor(&exec).unwrap().unwrap().status, ExecutorStatus::Stopped);
}

#[test]
fn stale_query_respects_cutoff_and_status() {
    let (_dir, db) = test_db();
    seed_executor(&db, "exe-fresh", T0 + 10_000);
    let old = seed_executor(&db, "exe-old", T0);
    let stopped = seed_executor(&db, "exe-stopped", T0);
    db.mark_executor_stopped(&stopped, T0 + 1).unwrap();

    let stale = db.stale_executors(T0 + 5_000).unwrap();
    let ids: Vec<&str> = stale.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![old.as_str()]);
}

#[test]
fn list_orders_by_recent_heartbeat() {
    let (_dir, db) = test_db();
    seed_executor(&db, "exe-a", T0);
    seed_executor(&db, "exe-b", T0 + 500);

    let all = db.list_executors().unwrap();
    assert_eq!(all[0].id, "exe-b");
    assert_eq!(all[1].id, "exe-a");
}
