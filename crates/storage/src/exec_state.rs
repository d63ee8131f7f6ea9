// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution state machine persistence: transitions, checkpoints,
//! watchdog interventions, and attempt history.

use crate::claim::append_event_tx;
use crate::db::{with_busy_retry, Database};
use crate::error::{text_column, StoreError};
use crate::issues::{placeholders, BATCH_CHUNK};
use crate::Result;
use fm_core::{
    AgentEvent, AgentEventKind, ExecutionAttempt, ExecutionPhase, ExecutionStateRow, ExecutorId,
    IssueId,
};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::str::FromStr;

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionStateRow> {
    Ok(ExecutionStateRow {
        issue_id: IssueId::from_string(row.get::<_, String>(0)?),
        executor: row.get::<_, Option<String>>(1)?.map(ExecutorId::from_string),
        claimed_at_ms: row.get::<_, Option<i64>>(2)?.map(|v| v as u64),
        phase: text_column(3, row.get::<_, String>(3)?)?,
        checkpoint: row.get(4)?,
        error_message: row.get(5)?,
        intervention_count: row.get::<_, i64>(6)? as u32,
        last_intervention_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        updated_at_ms: row.get::<_, i64>(8)? as u64,
    })
}

const STATE_COLUMNS: &str = "issue_id, executor_instance_id, claimed_at, state, \
     checkpoint_data, error_message, intervention_count, last_intervention_time, updated_at";

impl Database {
    /// Advance the issue's lifecycle phase.
    ///
    /// Same-phase calls are accepted as no-ops so crash-recovery paths can
    /// re-initialize defensively. When no row exists only `pending` or
    /// `claimed` may start one. Anything outside the transition table is
    /// refused with the valid choices in the message. Unlike the claim
    /// engine, transitions are never retried.
    pub fn update_state(&self, issue: &IssueId, new: ExecutionPhase, now_ms: u64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT state FROM issue_execution_state WHERE issue_id = ?1",
                [issue.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match current {
            None => {
                if !matches!(new, ExecutionPhase::Pending | ExecutionPhase::Claimed) {
                    return Err(StoreError::InvalidInitialPhase { issue: *issue, phase: new });
                }
                tx.execute(
                    "INSERT INTO issue_execution_state (issue_id, state, updated_at) \
                     VALUES (?1, ?2, ?3)",
                    params![issue.as_str(), new.to_string(), now_ms as i64],
                )?;
            }
            Some(state) => {
                let from = ExecutionPhase::from_str(&state)
                    .map_err(|_| StoreError::ExecutionStateNotFound { issue: *issue })?;
                if from == new {
                    return Ok(());
                }
                if !from.can_transition_to(new) {
                    let valid = from
                        .valid_transitions()
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(StoreError::InvalidTransition {
                        issue: *issue,
                        from,
                        to: new,
                        valid: if valid.is_empty() { "none".to_string() } else { valid },
                    });
                }
                tx.execute(
                    "UPDATE issue_execution_state SET state = ?1, updated_at = ?2 \
                     WHERE issue_id = ?3",
                    params![new.to_string(), now_ms as i64, issue.as_str()],
                )?;
                append_event_tx(
                    &tx,
                    &AgentEvent::new(
                        AgentEventKind::PhaseChanged,
                        format!("{from} -> {new}"),
                        now_ms,
                    )
                    .issue(*issue),
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// The execution-state row for an issue, if it was ever claimed.
    pub fn execution_state(&self, issue: &IssueId) -> Result<Option<ExecutionStateRow>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM issue_execution_state WHERE issue_id = ?1"
        );
        Ok(conn.query_row(&sql, [issue.as_str()], state_from_row).optional()?)
    }

    /// Batch-load execution-state rows, for dispatch-time backoff checks.
    pub fn execution_states_for(
        &self,
        ids: &[IssueId],
    ) -> Result<HashMap<IssueId, ExecutionStateRow>> {
        let conn = self.conn()?;
        let mut out = HashMap::new();
        for chunk in ids.chunks(BATCH_CHUNK) {
            let sql = format!(
                "SELECT {STATE_COLUMNS} FROM issue_execution_state WHERE issue_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(chunk.iter().map(|id| id.as_str())),
                state_from_row,
            )?;
            for row in rows {
                let row = row?;
                out.insert(row.issue_id, row);
            }
        }
        Ok(out)
    }

    /// Store the agent's opaque checkpoint blob. Fails when the issue has
    /// no execution-state row.
    pub fn save_checkpoint(&self, issue: &IssueId, data: &str, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE issue_execution_state SET checkpoint_data = ?1, updated_at = ?2 \
             WHERE issue_id = ?3",
            params![data, now_ms as i64, issue.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::ExecutionStateNotFound { issue: *issue });
        }
        Ok(())
    }

    /// The saved checkpoint, if any.
    pub fn checkpoint(&self, issue: &IssueId) -> Result<Option<String>> {
        let conn = self.conn()?;
        let data: Option<Option<String>> = conn
            .query_row(
                "SELECT checkpoint_data FROM issue_execution_state WHERE issue_id = ?1",
                [issue.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data.flatten())
    }

    /// Record a watchdog intervention, returning the new count.
    ///
    /// Upsert: a concurrent release may have deleted the row, in which
    /// case the intervention starts a fresh pending row at count 1. The
    /// dispatcher consults the count and timestamp for backoff.
    pub fn record_intervention(&self, issue: &IssueId, now_ms: u64) -> Result<u32> {
        with_busy_retry(|| {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let count: i64 = tx.query_row(
                "INSERT INTO issue_execution_state \
                     (issue_id, state, intervention_count, last_intervention_time, updated_at) \
                 VALUES (?1, 'pending', 1, ?2, ?2) \
                 ON CONFLICT(issue_id) DO UPDATE SET \
                     intervention_count = intervention_count + 1, \
                     last_intervention_time = excluded.last_intervention_time, \
                     updated_at = excluded.updated_at \
                 RETURNING intervention_count",
                params![issue.as_str(), now_ms as i64],
                |row| row.get(0),
            )?;
            append_event_tx(
                &tx,
                &AgentEvent::new(
                    AgentEventKind::InterventionRecorded,
                    format!("watchdog intervention #{count}"),
                    now_ms,
                )
                .issue(*issue),
            )?;
            tx.commit()?;
            Ok(count as u32)
        })
    }

    /// Open a history row for a new attempt, returning its id.
    pub fn begin_attempt(
        &self,
        issue: &IssueId,
        executor: &ExecutorId,
        now_ms: u64,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO execution_history \
                 (issue_id, executor_instance_id, started_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3)",
            params![issue.as_str(), executor.as_str(), now_ms as i64],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Close a history row with the attempt outcome.
    pub fn finish_attempt(
        &self,
        attempt_id: i64,
        success: bool,
        exit_code: Option<i32>,
        summary: Option<&str>,
        now_ms: u64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE execution_history SET \
                 finished_at = ?1, success = ?2, exit_code = ?3, summary = ?4, updated_at = ?1 \
             WHERE id = ?5",
            params![now_ms as i64, success, exit_code, summary, attempt_id],
        )?;
        Ok(())
    }

    /// Attempt history for an issue, oldest first.
    pub fn attempts(&self, issue: &IssueId) -> Result<Vec<ExecutionAttempt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, issue_id, executor_instance_id, started_at, finished_at, \
                    success, exit_code, summary \
             FROM execution_history WHERE issue_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([issue.as_str()], |row| {
            Ok(ExecutionAttempt {
                id: row.get(0)?,
                issue_id: IssueId::from_string(row.get::<_, String>(1)?),
                executor: ExecutorId::from_string(row.get::<_, String>(2)?),
                started_at_ms: row.get::<_, i64>(3)? as u64,
                finished_at_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                success: row.get(5)?,
                exit_code: row.get(6)?,
                summary: row.get(7)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "exec_state_tests.rs"]
mod tests;
