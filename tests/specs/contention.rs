// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim exclusivity under contention.

use crate::prelude::Fleet;
use fm_core::Clock;
use std::sync::Arc;

/// Five executors race for one issue: exactly one commit wins, and the
/// winner is recorded as the owner.
#[test]
fn five_way_claim_race_has_one_winner() {
    let fleet = Fleet::new();
    let issue = fleet.task("vc-contested", 0);
    let executors: Vec<_> = (0..5)
        .map(|i| fleet.executor(&format!("exe-{i}")))
        .collect();
    let now_ms = fleet.clock.epoch_ms();

    let db = Arc::clone(&fleet.db);
    let handles: Vec<_> = executors
        .iter()
        .copied()
        .map(|executor| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || (executor, db.claim(&issue, &executor, now_ms)))
        })
        .collect();

    let mut winner = None;
    let mut losses = 0;
    for handle in handles {
        let (executor, result) = handle.join().unwrap();
        match result {
            Ok(()) => {
                assert!(winner.is_none(), "two claims committed");
                winner = Some(executor);
            }
            Err(e) => {
                assert!(e.is_claim_contention(), "loser saw the wrong error: {e}");
                losses += 1;
            }
        }
    }
    assert_eq!(losses, 4);

    let row = fleet.db.execution_state(&issue).unwrap().unwrap();
    assert_eq!(row.executor, winner, "the winner owns the claim");
}

/// Claims against disjoint issues never starve: every executor gets its
/// own issue even when all transactions land at once.
#[test]
fn disjoint_claims_all_commit() {
    let fleet = Fleet::new();
    let pairs: Vec<_> = (0..6)
        .map(|i| {
            (
                fleet.task(&format!("vc-{i}"), 1),
                fleet.executor(&format!("exe-{i}")),
            )
        })
        .collect();
    let now_ms = fleet.clock.epoch_ms();

    let handles: Vec<_> = pairs
        .into_iter()
        .map(|(issue, executor)| {
            let db = Arc::clone(&fleet.db);
            std::thread::spawn(move || db.claim(&issue, &executor, now_ms))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}
