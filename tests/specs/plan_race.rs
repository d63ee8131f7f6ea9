// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan refinement under optimistic concurrency.

use crate::prelude::Fleet;
use fm_core::{Clock, IssueType, NewIssue, PlanDraft};
use std::sync::Arc;

/// Two refiners read iteration 5 and both write: one lands iteration 6,
/// the other gets the stale sentinel, and the surviving body belongs to
/// the winner.
#[test]
fn refinement_race_one_winner_one_stale() {
    let fleet = Fleet::new();
    let mission = NewIssue::new(IssueType::Epic, "refined mission");
    fleet.db.create_issue(&mission, fleet.clock.epoch_ms()).unwrap();

    for i in 0..5u32 {
        fleet
            .db
            .store_plan(&PlanDraft::new(mission.id, format!("v{}", i + 1)), i, fleet.clock.epoch_ms())
            .unwrap();
    }
    assert_eq!(fleet.db.get_plan(&mission.id).unwrap().unwrap().iteration, 5);

    let now_ms = fleet.clock.epoch_ms();
    let handles: Vec<_> = ["refiner-a", "refiner-b"]
        .into_iter()
        .map(|name| {
            let db = Arc::clone(&fleet.db);
            let mission_id = mission.id;
            std::thread::spawn(move || {
                (name, db.store_plan(&PlanDraft::new(mission_id, name), 5, now_ms))
            })
        })
        .collect();

    let mut winner_name = None;
    let mut stale_seen = 0;
    for handle in handles {
        let (name, result) = handle.join().unwrap();
        match result {
            Ok(iteration) => {
                assert_eq!(iteration, 6);
                winner_name = Some(name);
            }
            Err(e) => {
                assert!(e.is_stale_iteration(), "loser must see STALE_ITERATION: {e}");
                stale_seen += 1;
            }
        }
    }
    assert_eq!(stale_seen, 1);

    let plan = fleet.db.get_plan(&mission.id).unwrap().unwrap();
    assert_eq!(plan.iteration, 6);
    assert_eq!(Some(plan.body.as_str()), winner_name, "stored body is the winner's");
}

/// Iterations stay contiguous through mixed force and guarded writes.
#[test]
fn iterations_have_no_gaps() {
    let fleet = Fleet::new();
    let mission = NewIssue::new(IssueType::Epic, "mission");
    fleet.db.create_issue(&mission, fleet.clock.epoch_ms()).unwrap();
    let now = fleet.clock.epoch_ms();

    assert_eq!(fleet.db.store_plan(&PlanDraft::new(mission.id, "a"), 0, now).unwrap(), 1);
    assert_eq!(fleet.db.store_plan(&PlanDraft::new(mission.id, "b"), 1, now).unwrap(), 2);
    assert_eq!(fleet.db.store_plan(&PlanDraft::new(mission.id, "c"), 0, now).unwrap(), 3);
    assert_eq!(fleet.db.store_plan(&PlanDraft::new(mission.id, "d"), 3, now).unwrap(), 4);
}
