// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: stale sweep and checkpoint resume.

use crate::prelude::Fleet;
use fm_core::{Clock, ExecutionPhase, ExecutorStatus, IssueStatus};
use std::time::Duration;

/// An executor dies mid-execution. A peer's sweep marks it crashed,
/// resets the issue to the ready pool with no owner, keeps the
/// checkpoint, and leaves an explanatory event.
#[test]
fn sweep_recovers_orphaned_claim() {
    let fleet = Fleet::new();
    let issue = fleet.task("vc-x", 1);
    let dead = fleet.executor("exe-dead");

    let t0 = fleet.clock.epoch_ms();
    fleet.db.claim(&issue, &dead, t0).unwrap();
    fleet.db.update_state(&issue, ExecutionPhase::Assessing, t0).unwrap();
    fleet.db.update_state(&issue, ExecutionPhase::Executing, t0).unwrap();
    fleet.db.save_checkpoint(&issue, "reasoning so far", t0).unwrap();

    // Ten minutes pass with no heartbeat; the sweep threshold is five.
    fleet.clock.advance(Duration::from_secs(10 * 60));
    let outcome = fleet
        .db
        .cleanup_stale(Duration::from_secs(5 * 60), fleet.clock.epoch_ms())
        .unwrap();
    assert_eq!(outcome.released_issues, vec![issue]);

    assert_eq!(
        fleet.db.executor(&dead).unwrap().unwrap().status,
        ExecutorStatus::Crashed
    );
    let row = fleet.db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.phase, ExecutionPhase::Pending);
    assert_eq!(row.executor, None);
    assert_eq!(row.checkpoint.as_deref(), Some("reasoning so far"));
    assert_eq!(
        fleet.db.issue(&issue).unwrap().unwrap().status,
        IssueStatus::Open
    );
    assert!(fleet
        .db
        .agent_events_since(0, 50)
        .unwrap()
        .iter()
        .any(|e| e.issue_id == Some(issue)));
}

/// After the sweep, a healthy executor re-claims and resumes from the
/// preserved checkpoint instead of starting over.
#[test]
fn reclaim_resumes_from_checkpoint() {
    let fleet = Fleet::new();
    let issue = fleet.task("vc-x", 1);
    let dead = fleet.executor("exe-dead");

    let t0 = fleet.clock.epoch_ms();
    fleet.db.claim(&issue, &dead, t0).unwrap();
    fleet.db.save_checkpoint(&issue, "step 3 of 7", t0).unwrap();

    fleet.clock.advance(Duration::from_secs(10 * 60));
    fleet
        .db
        .cleanup_stale(Duration::from_secs(5 * 60), fleet.clock.epoch_ms())
        .unwrap();

    let successor = fleet.executor("exe-live");
    fleet
        .db
        .claim(&issue, &successor, fleet.clock.epoch_ms())
        .unwrap();
    assert_eq!(
        fleet.db.checkpoint(&issue).unwrap().as_deref(),
        Some("step 3 of 7"),
        "resumed attempt reconstructs in-progress reasoning"
    );
}
