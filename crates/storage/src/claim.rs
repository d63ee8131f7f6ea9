// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim engine: exclusive, persistent leases of issues by executors.
//!
//! All cross-process exclusion lives here, enforced with immediate
//! transactions, the active-state check, and the conditional
//! `status='open'` UPDATE. Busy/locked races are retried with backoff;
//! contract refusals are not.

use crate::db::{with_busy_retry, Database};
use crate::error::StoreError;
use crate::Result;
use fm_core::{
    AgentEvent, AgentEventKind, EventSeverity, ExecutionPhase, ExecutorId, IssueId, IssueType,
};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use std::str::FromStr;
use std::time::Duration;

/// What a stale sweep released and who it declared crashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub released_issues: Vec<IssueId>,
    pub crashed_executors: Vec<ExecutorId>,
}

impl SweepOutcome {
    pub fn is_empty(&self) -> bool {
        self.released_issues.is_empty() && self.crashed_executors.is_empty()
    }
}

impl Database {
    /// Atomically claim `issue` for `executor`.
    ///
    /// Fails without retry when the issue is a task or bug with blank
    /// acceptance criteria, when another executor holds an active claim,
    /// or when the issue is not open. Under a busy database the whole
    /// transaction retries up to five times with exponential backoff.
    pub fn claim(&self, issue: &IssueId, executor: &ExecutorId, now_ms: u64) -> Result<()> {
        with_busy_retry(|| {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let row: Option<(String, String)> = tx
                .query_row(
                    "SELECT issue_type, acceptance_criteria FROM issues WHERE id = ?1",
                    [issue.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((issue_type, criteria)) = row else {
                return Err(StoreError::IssueNotFound { issue: *issue });
            };
            let issue_type = IssueType::from_str(&issue_type)
                .map_err(|_| StoreError::IssueNotFound { issue: *issue })?;
            if issue_type.requires_acceptance_criteria() && criteria.trim().is_empty() {
                return Err(StoreError::AcceptanceCriteriaRequired {
                    issue: *issue,
                    issue_type,
                });
            }

            let state: Option<(String, Option<String>)> = tx
                .query_row(
                    "SELECT state, executor_instance_id FROM issue_execution_state \
                     WHERE issue_id = ?1",
                    [issue.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((state, owner)) = state {
                let phase = ExecutionPhase::from_str(&state).unwrap_or(ExecutionPhase::Pending);
                if phase.is_active() {
                    return Err(StoreError::AlreadyClaimed {
                        issue: *issue,
                        executor: owner.unwrap_or_else(|| "unknown".to_string()),
                    });
                }
            }

            // Checkpoint data and intervention counters survive the upsert
            // so a re-claim resumes where the last attempt stopped.
            tx.execute(
                "INSERT INTO issue_execution_state \
                     (issue_id, executor_instance_id, claimed_at, state, updated_at) \
                 VALUES (?1, ?2, ?3, 'claimed', ?3) \
                 ON CONFLICT(issue_id) DO UPDATE SET \
                     executor_instance_id = excluded.executor_instance_id, \
                     claimed_at = excluded.claimed_at, \
                     state = 'claimed', \
                     error_message = NULL, \
                     updated_at = excluded.updated_at",
                params![issue.as_str(), executor.as_str(), now_ms as i64],
            )?;

            let n = tx.execute(
                "UPDATE issues SET status = 'in_progress', updated_at = ?1 \
                 WHERE id = ?2 AND status = 'open'",
                params![now_ms as i64, issue.as_str()],
            )?;
            if n == 0 {
                // Raced by another claim or the issue left the ready pool.
                return Err(StoreError::NotOpen { issue: *issue });
            }

            append_event_tx(
                &tx,
                &AgentEvent::new(AgentEventKind::Claimed, format!("claimed by {executor}"), now_ms)
                    .issue(*issue)
                    .executor(*executor),
            )?;

            tx.commit()?;
            tracing::info!(issue = %issue, executor = %executor, "issue claimed");
            Ok(())
        })
    }

    /// Drop the execution-state row entirely. Idempotent: releasing an
    /// unclaimed issue is success.
    pub fn release(&self, issue: &IssueId) -> Result<()> {
        with_busy_retry(|| {
            let conn = self.conn()?;
            conn.execute(
                "DELETE FROM issue_execution_state WHERE issue_id = ?1",
                [issue.as_str()],
            )?;
            Ok(())
        })
    }

    /// Mark the attempt failed and put the issue back in the ready pool,
    /// recording why.
    pub fn release_and_reopen(&self, issue: &IssueId, comment: &str, now_ms: u64) -> Result<()> {
        with_busy_retry(|| {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let n = tx.execute(
                "UPDATE issue_execution_state SET \
                     state = 'failed', \
                     error_message = ?1, \
                     updated_at = ?2 \
                 WHERE issue_id = ?3",
                params![comment, now_ms as i64, issue.as_str()],
            )?;
            if n == 0 {
                return Err(StoreError::ExecutionStateNotFound { issue: *issue });
            }

            tx.execute(
                "UPDATE issues SET status = 'open', closed_at = NULL, updated_at = ?1 \
                 WHERE id = ?2",
                params![now_ms as i64, issue.as_str()],
            )?;
            tx.execute(
                "INSERT INTO comments (issue_id, author, body, created_at) \
                 VALUES (?1, 'foreman', ?2, ?3)",
                params![issue.as_str(), comment, now_ms as i64],
            )?;
            append_event_tx(
                &tx,
                &AgentEvent::new(AgentEventKind::Released, comment, now_ms)
                    .severity(EventSeverity::Warning)
                    .issue(*issue),
            )?;

            tx.commit()?;
            tracing::warn!(issue = %issue, reason = comment, "claim released, issue reopened");
            Ok(())
        })
    }

    /// Release claims held by dead executors.
    ///
    /// Covers executors whose heartbeat is older than `threshold` and
    /// claims whose owner is already marked stopped. Checkpoint data and
    /// intervention counters are preserved so resumed attempts continue.
    /// Safe to re-run: released rows are pending with no owner and are
    /// not picked up again.
    pub fn cleanup_stale(&self, threshold: Duration, now_ms: u64) -> Result<SweepOutcome> {
        with_busy_retry(|| {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut outcome = SweepOutcome::default();

            let cutoff = now_ms.saturating_sub(threshold.as_millis() as u64);
            let mut stale: Vec<ExecutorId> = Vec::new();
            {
                let mut stmt = tx.prepare(
                    "SELECT instance_id FROM executor_instances \
                     WHERE status = 'running' AND last_heartbeat < ?1",
                )?;
                let rows =
                    stmt.query_map([cutoff as i64], |row| row.get::<_, String>(0))?;
                for row in rows {
                    stale.push(ExecutorId::from_string(row?));
                }
            }

            // Dead owners: stale-running plus anything already stopped
            // that still holds an active claim (orphaned by a crash
            // between stop-mark and release).
            let mut dead_owners: Vec<ExecutorId> = stale.clone();
            {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT es.executor_instance_id \
                     FROM issue_execution_state es \
                     JOIN executor_instances ei \
                       ON ei.instance_id = es.executor_instance_id \
                     WHERE ei.status = 'stopped' \
                       AND es.state IN ('claimed','assessing','executing',\
                                        'analyzing','gates','committing')",
                )?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                for row in rows {
                    let id = ExecutorId::from_string(row?);
                    if !dead_owners.contains(&id) {
                        dead_owners.push(id);
                    }
                }
            }

            for owner in &dead_owners {
                let mut issues: Vec<IssueId> = Vec::new();
                {
                    let mut stmt = tx.prepare(
                        "SELECT issue_id FROM issue_execution_state \
                         WHERE executor_instance_id = ?1 \
                           AND state IN ('claimed','assessing','executing',\
                                         'analyzing','gates','committing')",
                    )?;
                    let rows = stmt.query_map([owner.as_str()], |row| row.get::<_, String>(0))?;
                    for row in rows {
                        issues.push(IssueId::from_string(row?));
                    }
                }
                for issue in issues {
                    tx.execute(
                        "UPDATE issue_execution_state SET \
                             executor_instance_id = NULL, \
                             claimed_at = NULL, \
                             state = 'pending', \
                             updated_at = ?1 \
                         WHERE issue_id = ?2",
                        params![now_ms as i64, issue.as_str()],
                    )?;
                    tx.execute(
                        "UPDATE issues SET status = 'open', closed_at = NULL, updated_at = ?1 \
                         WHERE id = ?2",
                        params![now_ms as i64, issue.as_str()],
                    )?;
                    append_event_tx(
                        &tx,
                        &AgentEvent::new(
                            AgentEventKind::StaleSwept,
                            format!("released from {owner}: executor heartbeat went stale"),
                            now_ms,
                        )
                        .severity(EventSeverity::Warning)
                        .issue(issue)
                        .executor(*owner),
                    )?;
                    outcome.released_issues.push(issue);
                }
            }

            for executor in &stale {
                tx.execute(
                    "UPDATE executor_instances SET status = 'crashed', updated_at = ?1 \
                     WHERE instance_id = ?2 AND status = 'running'",
                    params![now_ms as i64, executor.as_str()],
                )?;
                outcome.crashed_executors.push(*executor);
            }

            tx.commit()?;
            if !outcome.is_empty() {
                tracing::warn!(
                    released = outcome.released_issues.len(),
                    crashed = outcome.crashed_executors.len(),
                    "stale sweep released orphaned claims"
                );
            }
            Ok(outcome)
        })
    }
}

/// Append an agent event inside an open transaction.
pub(crate) fn append_event_tx(tx: &Transaction<'_>, event: &AgentEvent) -> Result<()> {
    tx.execute(
        "INSERT INTO agent_events (kind, severity, issue_id, executor_instance_id, \
         message, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.kind.to_string(),
            event.severity.to_string(),
            event.issue_id.as_ref().map(|id| id.as_str().to_string()),
            event.executor.as_ref().map(|id| id.as_str().to_string()),
            event.message,
            event.created_at_ms as i64,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod tests;
