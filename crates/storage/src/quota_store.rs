// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable quota history: snapshots and per-call operations.

use crate::db::Database;
use crate::error::text_column;
use crate::Result;
use fm_core::{IssueId, QuotaOperation, QuotaSnapshot, SnapshotId};
use rusqlite::params;
use std::time::Duration;

impl Database {
    /// Append one snapshot row.
    pub fn append_quota_snapshot(&self, snapshot: &QuotaSnapshot) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO quota_snapshots \
                 (id, taken_at, hourly_tokens, hourly_cost, total_tokens, total_cost, \
                  unique_issues) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.id.as_str(),
                snapshot.taken_at_ms as i64,
                snapshot.hourly_tokens_used as i64,
                snapshot.hourly_cost_used,
                snapshot.total_tokens_used as i64,
                snapshot.total_cost_used,
                snapshot.unique_issues as i64,
            ],
        )?;
        Ok(())
    }

    /// Snapshots at or after `since_ms`, oldest first.
    pub fn quota_snapshots_since(&self, since_ms: u64) -> Result<Vec<QuotaSnapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, taken_at, hourly_tokens, hourly_cost, total_tokens, total_cost, \
                    unique_issues \
             FROM quota_snapshots WHERE taken_at >= ?1 ORDER BY taken_at",
        )?;
        let rows = stmt.query_map([since_ms as i64], |row| {
            Ok(QuotaSnapshot {
                id: SnapshotId::from_string(row.get::<_, String>(0)?),
                taken_at_ms: row.get::<_, i64>(1)? as u64,
                hourly_tokens_used: row.get::<_, i64>(2)? as u64,
                hourly_cost_used: row.get(3)?,
                total_tokens_used: row.get::<_, i64>(4)? as u64,
                total_cost_used: row.get(5)?,
                unique_issues: row.get::<_, i64>(6)? as u32,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Append one per-AI-call attribution record.
    pub fn append_quota_operation(&self, op: &QuotaOperation) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO quota_operations \
                 (issue_id, operation, model, input_tokens, output_tokens, cost, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                op.issue_id.as_ref().map(|id| id.as_str().to_string()),
                op.operation.to_string(),
                op.model,
                op.input_tokens as i64,
                op.output_tokens as i64,
                op.cost,
                op.recorded_at_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// Operations recorded against one issue, oldest first.
    pub fn quota_operations_for(&self, issue: &IssueId) -> Result<Vec<QuotaOperation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT issue_id, operation, model, input_tokens, output_tokens, cost, recorded_at \
             FROM quota_operations WHERE issue_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([issue.as_str()], |row| {
            Ok(QuotaOperation {
                issue_id: row.get::<_, Option<String>>(0)?.map(IssueId::from_string),
                operation: text_column(1, row.get::<_, String>(1)?)?,
                model: row.get(2)?,
                input_tokens: row.get::<_, i64>(3)? as u64,
                output_tokens: row.get::<_, i64>(4)? as u64,
                cost: row.get(5)?,
                recorded_at_ms: row.get::<_, i64>(6)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Drop quota rows older than the retention window. Returns
    /// (snapshots, operations) removed.
    pub fn prune_quota_data(&self, retention: Duration, now_ms: u64) -> Result<(usize, usize)> {
        let conn = self.conn()?;
        let cutoff = now_ms.saturating_sub(retention.as_millis() as u64) as i64;
        let snapshots =
            conn.execute("DELETE FROM quota_snapshots WHERE taken_at < ?1", [cutoff])?;
        let operations =
            conn.execute("DELETE FROM quota_operations WHERE recorded_at < ?1", [cutoff])?;
        if snapshots > 0 || operations > 0 {
            tracing::debug!(snapshots, operations, "pruned quota history");
        }
        Ok((snapshots, operations))
    }
}

#[cfg(test)]
#[path = "quota_store_tests.rs"]
mod tests;
