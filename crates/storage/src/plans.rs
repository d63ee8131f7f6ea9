// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan store with optimistic concurrency on the iteration counter.

use crate::db::{with_busy_retry, Database};
use crate::error::{text_column, StoreError};
use crate::Result;
use fm_core::{IssueId, MissionPlan, PlanDraft};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<MissionPlan> {
    Ok(MissionPlan {
        mission_id: IssueId::from_string(row.get::<_, String>(0)?),
        status: text_column(1, row.get::<_, String>(1)?)?,
        body: row.get(2)?,
        iteration: row.get::<_, i64>(3)? as u32,
        created_at_ms: row.get::<_, i64>(4)? as u64,
        updated_at_ms: row.get::<_, i64>(5)? as u64,
    })
}

const PLAN_COLUMNS: &str = "mission_id, status, body, iteration, created_at, updated_at";

impl Database {
    /// Write a plan, guarded by the iteration the writer last read.
    ///
    /// `expected_iteration == 0` creates or force-overwrites; otherwise
    /// the write commits only when the stored iteration still matches,
    /// and a mismatch surfaces as [`StoreError::StaleIteration`] for the
    /// caller to refetch and retry. Returns the new iteration. The body
    /// arrives pre-serialized; the transaction only does the existence
    /// check and the write, so partial writes are impossible.
    pub fn store_plan(&self, draft: &PlanDraft, expected_iteration: u32, now_ms: u64) -> Result<u32> {
        with_busy_retry(|| {
            let mut conn = self.conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: Option<i64> = tx
                .query_row(
                    "SELECT iteration FROM mission_plans WHERE mission_id = ?1",
                    [draft.mission_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let next = match (expected_iteration, current) {
                (0, None) => {
                    tx.execute(
                        "INSERT INTO mission_plans \
                             (mission_id, status, body, iteration, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                        params![
                            draft.mission_id.as_str(),
                            draft.status.to_string(),
                            draft.body,
                            now_ms as i64,
                        ],
                    )?;
                    1
                }
                (0, Some(cur)) => {
                    let next = cur as u32 + 1;
                    tx.execute(
                        "UPDATE mission_plans SET status = ?1, body = ?2, iteration = ?3, \
                         updated_at = ?4 WHERE mission_id = ?5",
                        params![
                            draft.status.to_string(),
                            draft.body,
                            next as i64,
                            now_ms as i64,
                            draft.mission_id.as_str(),
                        ],
                    )?;
                    next
                }
                (expected, found) => {
                    let found = found.unwrap_or(0) as u32;
                    if found != expected {
                        return Err(StoreError::StaleIteration {
                            mission: draft.mission_id,
                            expected,
                            found,
                        });
                    }
                    let next = found + 1;
                    tx.execute(
                        "UPDATE mission_plans SET status = ?1, body = ?2, iteration = ?3, \
                         updated_at = ?4 WHERE mission_id = ?5 AND iteration = ?6",
                        params![
                            draft.status.to_string(),
                            draft.body,
                            next as i64,
                            now_ms as i64,
                            draft.mission_id.as_str(),
                            found as i64,
                        ],
                    )?;
                    next
                }
            };

            tx.commit()?;
            tracing::debug!(mission = %draft.mission_id, iteration = next, "plan stored");
            Ok(next)
        })
    }

    /// The current plan, or `None` when the mission has none (absence is
    /// not an error).
    pub fn get_plan(&self, mission_id: &IssueId) -> Result<Option<MissionPlan>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {PLAN_COLUMNS} FROM mission_plans WHERE mission_id = ?1");
        Ok(conn
            .query_row(&sql, [mission_id.as_str()], plan_from_row)
            .optional()?)
    }

    /// Delete the plan. Idempotent.
    pub fn delete_plan(&self, mission_id: &IssueId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM mission_plans WHERE mission_id = ?1",
            [mission_id.as_str()],
        )?;
        Ok(())
    }

    /// Plans still in flight (anything not approved), most recently
    /// touched first.
    pub fn list_draft_plans(&self) -> Result<Vec<MissionPlan>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM mission_plans \
             WHERE status != 'approved' ORDER BY updated_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], plan_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;
