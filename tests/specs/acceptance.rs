// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The acceptance-criteria gate at creation and claim time.

use crate::prelude::Fleet;
use fm_core::{Clock, IssueType, NewIssue};
use fm_storage::StoreError;

#[test]
fn tasks_without_criteria_cannot_be_created() {
    let fleet = Fleet::new();
    let err = fleet
        .db
        .create_issue(&NewIssue::new(IssueType::Task, "undefined work"), fleet.clock.epoch_ms())
        .unwrap_err();
    assert!(matches!(err, StoreError::AcceptanceCriteriaRequired { .. }));
}

#[test]
fn chores_and_epics_need_no_criteria() {
    let fleet = Fleet::new();
    fleet
        .db
        .create_issue(&NewIssue::new(IssueType::Chore, "sweep the floor"), fleet.clock.epoch_ms())
        .unwrap();
    fleet
        .db
        .create_issue(&NewIssue::new(IssueType::Epic, "the grand plan"), fleet.clock.epoch_ms())
        .unwrap();
}

/// A task that lost its criteria after creation is refused at claim time
/// with a message naming the field and the issue.
#[test]
fn claim_gate_names_field_and_issue() {
    let fleet = Fleet::new();
    let issue = fleet.task("vc-gate", 1);
    let executor = fleet.executor("exe-1");

    fleet
        .db
        .update_issue_acceptance_criteria(&issue, "   ", fleet.clock.epoch_ms())
        .unwrap();

    let err = fleet
        .db
        .claim(&issue, &executor, fleet.clock.epoch_ms())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("vc-gate"), "{message}");
    assert!(message.contains("acceptance_criteria"), "{message}");
    assert!(message.contains("required"), "{message}");
}
