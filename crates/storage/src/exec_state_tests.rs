// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_util::{seed_executor, seed_task, test_db, T0};
use crate::StoreError;
use fm_core::ExecutionPhase;

#[test]
fn full_lifecycle_walk() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();

    for (i, phase) in [
        ExecutionPhase::Assessing,
        ExecutionPhase::Executing,
        ExecutionPhase::Analyzing,
        ExecutionPhase::Gates,
        ExecutionPhase::Committing,
        ExecutionPhase::Completed,
    ]
    .into_iter()
    .enumerate()
    {
        db.update_state(&issue, phase, T0 + i as u64).unwrap();
    }

    let row = db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.phase, ExecutionPhase::Completed);
}

#[test]
fn skipping_phases_is_refused_with_valid_choices() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();

    let err = db.update_state(&issue, ExecutionPhase::Committing, T0).unwrap_err();
    let StoreError::InvalidTransition { from, to, ref valid, .. } = err else {
        panic!("expected InvalidTransition, got {err}");
    };
    assert_eq!(from, ExecutionPhase::Claimed);
    assert_eq!(to, ExecutionPhase::Committing);
    assert!(valid.contains("assessing"));
    assert!(valid.contains("failed"));
}

#[test]
fn terminal_states_reject_everything() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();
    db.update_state(&issue, ExecutionPhase::Assessing, T0).unwrap();
    db.update_state(&issue, ExecutionPhase::Failed, T0).unwrap();

    let err = db.update_state(&issue, ExecutionPhase::Claimed, T0).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    assert!(err.to_string().contains("none"));
}

#[test]
fn same_state_is_a_noop_success() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();

    db.update_state(&issue, ExecutionPhase::Claimed, T0 + 1).unwrap();
    db.update_state(&issue, ExecutionPhase::Assessing, T0 + 2).unwrap();
    db.update_state(&issue, ExecutionPhase::Assessing, T0 + 3).unwrap();
}

#[test]
fn initial_state_must_be_pending_or_claimed() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);

    let err = db.update_state(&issue, ExecutionPhase::Executing, T0).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInitialPhase { .. }));

    db.update_state(&issue, ExecutionPhase::Pending, T0).unwrap();
    let row = db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.phase, ExecutionPhase::Pending);
}

#[test]
fn checkpoint_round_trip() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&issue, &exec, T0).unwrap();

    assert_eq!(db.checkpoint(&issue).unwrap(), None);
    db.save_checkpoint(&issue, "phase-two-notes", T0 + 1).unwrap();
    assert_eq!(db.checkpoint(&issue).unwrap().as_deref(), Some("phase-two-notes"));

    // Overwrite wins.
    db.save_checkpoint(&issue, "phase-three-notes", T0 + 2).unwrap();
    assert_eq!(db.checkpoint(&issue).unwrap().as_deref(), Some("phase-three-notes"));
}

#[test]
fn checkpoint_without_state_row_fails() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let err = db.save_checkpoint(&issue, "orphan", T0).unwrap_err();
    assert!(matches!(err, StoreError::ExecutionStateNotFound { .. }));
}

#[test]
fn intervention_upsert_counts_from_scratch() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);

    // No row yet (a release may have deleted it): insert at 1.
    assert_eq!(db.record_intervention(&issue, T0).unwrap(), 1);
    assert_eq!(db.record_intervention(&issue, T0 + 1).unwrap(), 2);
    assert_eq!(db.record_intervention(&issue, T0 + 2).unwrap(), 3);

    let row = db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.intervention_count, 3);
    assert_eq!(row.last_intervention_ms, Some(T0 + 2));
}

#[test]
fn intervention_survives_claim_and_release_cycle() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);

    db.record_intervention(&issue, T0).unwrap();
    db.claim(&issue, &exec, T0 + 1).unwrap();

    let row = db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.intervention_count, 1, "claim must not reset the counter");
}

#[test]
fn attempt_history_is_append_only() {
    let (_dir, db) = test_db();
    let issue = seed_task(&db, "vc-1", 1);
    let exec = seed_executor(&db, "exe-1", T0);

    let first = db.begin_attempt(&issue, &exec, T0).unwrap();
    db.finish_attempt(first, false, Some(1), Some("gates failed"), T0 + 100).unwrap();
    let second = db.begin_attempt(&issue, &exec, T0 + 200).unwrap();
    db.finish_attempt(second, true, Some(0), Some("merged"), T0 + 300).unwrap();

    let attempts = db.attempts(&issue).unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].success, Some(false));
    assert_eq!(attempts[0].summary.as_deref(), Some("gates failed"));
    assert_eq!(attempts[1].success, Some(true));
    assert_eq!(attempts[1].finished_at_ms, Some(T0 + 300));
}

#[test]
fn execution_states_for_batches() {
    let (_dir, db) = test_db();
    let a = seed_task(&db, "vc-a", 1);
    let b = seed_task(&db, "vc-b", 1);
    let c = seed_task(&db, "vc-c", 1);
    let exec = seed_executor(&db, "exe-1", T0);
    db.claim(&a, &exec, T0).unwrap();
    db.record_intervention(&b, T0).unwrap();

    let map = db.execution_states_for(&[a, b, c]).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&a).unwrap().phase, fm_core::ExecutionPhase::Claimed);
    assert_eq!(map.get(&b).unwrap().intervention_count, 1);
    assert!(!map.contains_key(&c));
}
