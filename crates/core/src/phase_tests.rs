// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::*;
use proptest::prelude::*;
use std::str::FromStr;

#[yare::parameterized(
    pending_to_claimed = { ExecutionPhase::Pending, ExecutionPhase::Claimed, true },
    claimed_to_assessing = { ExecutionPhase::Claimed, ExecutionPhase::Assessing, true },
    assessing_to_executing = { ExecutionPhase::Assessing, ExecutionPhase::Executing, true },
    executing_to_analyzing = { ExecutionPhase::Executing, ExecutionPhase::Analyzing, true },
    analyzing_to_gates = { ExecutionPhase::Analyzing, ExecutionPhase::Gates, true },
    gates_to_committing = { ExecutionPhase::Gates, ExecutionPhase::Committing, true },
    committing_to_completed = { ExecutionPhase::Committing, ExecutionPhase::Completed, true },
    claimed_to_failed = { ExecutionPhase::Claimed, ExecutionPhase::Failed, true },
    committing_to_failed = { ExecutionPhase::Committing, ExecutionPhase::Failed, true },
    pending_to_executing = { ExecutionPhase::Pending, ExecutionPhase::Executing, false },
    pending_to_failed = { ExecutionPhase::Pending, ExecutionPhase::Failed, false },
    claimed_to_committing = { ExecutionPhase::Claimed, ExecutionPhase::Committing, false },
    executing_to_claimed = { ExecutionPhase::Executing, ExecutionPhase::Claimed, false },
    completed_to_anything = { ExecutionPhase::Completed, ExecutionPhase::Claimed, false },
    failed_to_pending = { ExecutionPhase::Failed, ExecutionPhase::Pending, false },
)]
fn transition_table(from: ExecutionPhase, to: ExecutionPhase, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_phases_have_no_transitions() {
    assert!(ExecutionPhase::Completed.valid_transitions().is_empty());
    assert!(ExecutionPhase::Failed.valid_transitions().is_empty());
}

#[test]
fn active_phases_exclude_terminals_and_pending() {
    assert!(!ExecutionPhase::Pending.is_active());
    assert!(!ExecutionPhase::Completed.is_active());
    assert!(!ExecutionPhase::Failed.is_active());
    assert!(ExecutionPhase::Claimed.is_active());
    assert!(ExecutionPhase::Committing.is_active());
}

#[test]
fn same_phase_is_not_a_transition() {
    // update_state handles the idempotent no-op before consulting the table
    assert!(!ExecutionPhase::Executing.can_transition_to(ExecutionPhase::Executing));
}

#[test]
fn display_from_str_round_trip() {
    for phase in [
        ExecutionPhase::Pending,
        ExecutionPhase::Claimed,
        ExecutionPhase::Assessing,
        ExecutionPhase::Executing,
        ExecutionPhase::Analyzing,
        ExecutionPhase::Gates,
        ExecutionPhase::Committing,
        ExecutionPhase::Completed,
        ExecutionPhase::Failed,
    ] {
        let parsed = ExecutionPhase::from_str(&phase.to_string()).unwrap();
        assert_eq!(parsed, phase);
    }
}

#[test]
fn from_str_rejects_unknown() {
    assert!(ExecutionPhase::from_str("meditating").is_err());
}

#[yare::parameterized(
    zero = { 0, 0 },
    first = { 1, 5 * 60 },
    second = { 2, 10 * 60 },
    third = { 3, 20 * 60 },
    sixth = { 6, 160 * 60 },
    capped = { 7, 4 * 60 * 60 },
    huge = { 40, 4 * 60 * 60 },
)]
fn backoff_curve(count: u32, expect_secs: u64) {
    assert_eq!(intervention_backoff(count).as_secs(), expect_secs);
}

proptest! {
    #[test]
    fn transitions_only_leave_active_or_pending(from in arb_phase(), to in arb_phase()) {
        if from.can_transition_to(to) {
            prop_assert!(!from.is_terminal());
        }
    }

    #[test]
    fn backoff_is_monotone(a in 0u32..32, b in 0u32..32) {
        if a <= b {
            prop_assert!(intervention_backoff(a) <= intervention_backoff(b));
        }
    }
}
