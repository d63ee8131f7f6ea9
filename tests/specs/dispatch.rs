// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ready-work visibility across executors.

use crate::prelude::Fleet;
use fm_core::Clock;
use fm_engine::{Dispatcher, FakeAgent, FakeVcs, IssueRunner, RunOutcome};
use fm_quota::{BudgetConfig, BudgetTracker};
use fm_storage::ReadyFilter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Both executors see the whole ready pool; after one claims an issue a
/// fresh query from the other no longer offers it.
#[test]
fn ready_work_shrinks_after_claim() {
    let fleet = Fleet::new();
    let a = fleet.task("vc-a", 1);
    fleet.task("vc-b", 1);
    fleet.task("vc-c", 1);
    fleet.task("vc-d", 1);
    let e1 = fleet.executor("exe-1");
    let _e2 = fleet.executor("exe-2");

    let seen_by_1 = fleet.db.ready_work(&ReadyFilter::default()).unwrap();
    let seen_by_2 = fleet.db.ready_work(&ReadyFilter::default()).unwrap();
    assert_eq!(seen_by_1.len(), 4);
    assert_eq!(seen_by_2.len(), 4);

    fleet.db.claim(&a, &e1, fleet.clock.epoch_ms()).unwrap();

    let after = fleet.db.ready_work(&ReadyFilter::default()).unwrap();
    let ids: Vec<&str> = after.iter().map(|r| r.issue.id.as_str()).collect();
    assert_eq!(ids, vec!["vc-b", "vc-c", "vc-d"]);
}

/// Dispatch, run, and close an issue end to end with fake adapters; the
/// next dispatch moves on to the remaining work.
#[tokio::test]
async fn dispatch_and_run_to_completion() {
    let fleet = Fleet::new();
    fleet.task("vc-first", 0);
    fleet.task("vc-second", 1);
    let executor = fleet.executor("exe-1");

    let dispatcher = Dispatcher::new(Arc::clone(&fleet.db), fleet.clock.clone());
    let budget = Arc::new(
        BudgetTracker::new(BudgetConfig::default(), fleet.clock.clone())
            .with_db(Arc::clone(&fleet.db)),
    );

    let claimed = dispatcher.next_claimed(&executor).unwrap().unwrap();
    assert_eq!(claimed.issue.id, "vc-first");

    let runner = IssueRunner::new(
        Arc::clone(&fleet.db),
        budget,
        FakeAgent::new(),
        FakeVcs::new(),
        fleet.clock.clone(),
        executor,
    );
    let outcome = runner.run(&claimed, &CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let next = dispatcher.next_claimed(&executor).unwrap().unwrap();
    assert_eq!(next.issue.id, "vc-second");
}
