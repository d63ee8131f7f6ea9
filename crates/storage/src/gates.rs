// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate baselines and review checkpoints.
//!
//! Before the gates phase runs, the executor records the pre-change
//! quality baseline (serialized metrics) so gate evaluation can flag
//! regressions rather than absolute failures.

use crate::db::Database;
use crate::Result;
use fm_core::IssueId;
use rusqlite::{params, OptionalExtension};

/// One recorded review verdict for an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCheckpoint {
    pub issue_id: IssueId,
    pub reviewer: String,
    pub verdict: String,
    pub notes: String,
    pub created_at_ms: u64,
}

impl Database {
    /// Upsert the serialized gate baseline for an issue.
    pub fn store_gate_baseline(&self, issue: &IssueId, baseline: &str, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO gate_baselines (issue_id, baseline, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(issue_id) DO UPDATE SET \
                 baseline = excluded.baseline, updated_at = excluded.updated_at",
            params![issue.as_str(), baseline, now_ms as i64],
        )?;
        Ok(())
    }

    /// The stored baseline, if any.
    pub fn gate_baseline(&self, issue: &IssueId) -> Result<Option<String>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT baseline FROM gate_baselines WHERE issue_id = ?1",
                [issue.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Append a review verdict.
    pub fn record_review_checkpoint(
        &self,
        issue: &IssueId,
        reviewer: &str,
        verdict: &str,
        notes: &str,
        now_ms: u64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO review_checkpoints (issue_id, reviewer, verdict, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![issue.as_str(), reviewer, verdict, notes, now_ms as i64],
        )?;
        Ok(())
    }

    /// Review history for an issue, oldest first.
    pub fn review_checkpoints(&self, issue: &IssueId) -> Result<Vec<ReviewCheckpoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT issue_id, reviewer, verdict, notes, created_at \
             FROM review_checkpoints WHERE issue_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([issue.as_str()], |row| {
            Ok(ReviewCheckpoint {
                issue_id: IssueId::from_string(row.get::<_, String>(0)?),
                reviewer: row.get(1)?,
                verdict: row.get(2)?,
                notes: row.get(3)?,
                created_at_ms: row.get::<_, i64>(4)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
