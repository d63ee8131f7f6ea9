// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch: pick the next claimable issue for an executor.
//!
//! Blocker-labeled work is served first, then the normal ready pool.
//! Issues inside their watchdog backoff window are skipped, and claim
//! races with other executors are tolerated by moving to the next
//! candidate.

use crate::error::EngineError;
use fm_core::{intervention_backoff, Clock, ExecutionStateRow, ExecutorId, IssueId};
use fm_storage::{Database, ReadyFilter, ReadyIssue};
use std::sync::Arc;

/// Claims ready work on behalf of one executor.
pub struct Dispatcher<C: Clock> {
    db: Arc<Database>,
    clock: C,
    filter: ReadyFilter,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(db: Arc<Database>, clock: C) -> Self {
        Self { db, clock, filter: ReadyFilter::default() }
    }

    pub fn with_filter(mut self, filter: ReadyFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Claim the next eligible issue, or `None` when nothing is ready.
    ///
    /// Contention errors (already claimed, not open, busy) skip to the
    /// next candidate; anything else aborts the scan.
    pub fn next_claimed(&self, executor: &ExecutorId) -> Result<Option<ReadyIssue>, EngineError> {
        let now_ms = self.clock.epoch_ms();

        let mut candidates: Vec<ReadyIssue> = Vec::new();
        for issue in self.db.ready_blockers(self.filter.limit)? {
            candidates.push(ReadyIssue { issue, mission: None });
        }
        for ready in self.db.ready_work(&self.filter)? {
            if candidates.iter().any(|c| c.issue.id == ready.issue.id) {
                continue;
            }
            candidates.push(ready);
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let ids: Vec<IssueId> = candidates.iter().map(|c| c.issue.id).collect();
        let states = self.db.execution_states_for(&ids)?;

        for candidate in candidates {
            if in_backoff(states.get(&candidate.issue.id), now_ms) {
                tracing::debug!(issue = %candidate.issue.id, "in watchdog backoff, skipped");
                continue;
            }
            match self.db.claim(&candidate.issue.id, executor, now_ms) {
                Ok(()) => return Ok(Some(candidate)),
                Err(e) if e.is_claim_contention() => {
                    tracing::debug!(issue = %candidate.issue.id, error = %e, "claim lost, trying next");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

/// Whether the issue is still inside the backoff window earned by
/// watchdog interventions: `min(5 min × 2^(count−1), 4 h)` measured from
/// the last intervention.
pub(crate) fn in_backoff(state: Option<&ExecutionStateRow>, now_ms: u64) -> bool {
    let Some(state) = state else {
        return false;
    };
    if state.intervention_count == 0 {
        return false;
    }
    let Some(last_ms) = state.last_intervention_ms else {
        return false;
    };
    let backoff = intervention_backoff(state.intervention_count);
    now_ms.saturating_sub(last_ms) < backoff.as_millis() as u64
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
