// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor registry: identity, heartbeats, graceful stops.

use crate::db::Database;
use crate::error::{text_column, StoreError};
use crate::Result;
use fm_core::{ExecutorId, ExecutorInstance, ExecutorStatus};
use rusqlite::{params, OptionalExtension, Row};

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutorInstance> {
    Ok(ExecutorInstance {
        id: ExecutorId::from_string(row.get::<_, String>(0)?),
        hostname: row.get(1)?,
        pid: row.get::<_, i64>(2)? as u32,
        version: row.get(3)?,
        started_at_ms: row.get::<_, i64>(4)? as u64,
        last_heartbeat_ms: row.get::<_, i64>(5)? as u64,
        status: text_column(6, row.get::<_, String>(6)?)?,
    })
}

impl Database {
    /// Register (or re-register) an executor instance.
    ///
    /// Upsert, never delete+insert: a delete would cascade through the
    /// execution-state foreign key and drop claim ownership. Re-registering
    /// with the same id after a clean restart keeps existing claims and
    /// resets the heartbeat.
    pub fn register_executor(&self, instance: &ExecutorInstance) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO executor_instances \
                 (instance_id, hostname, pid, version, started_at, last_heartbeat, \
                  status, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6) \
             ON CONFLICT(instance_id) DO UPDATE SET \
                 hostname = excluded.hostname, \
                 pid = excluded.pid, \
                 version = excluded.version, \
                 started_at = excluded.started_at, \
                 last_heartbeat = excluded.last_heartbeat, \
                 status = excluded.status, \
                 updated_at = excluded.updated_at",
            params![
                instance.id.as_str(),
                instance.hostname,
                instance.pid as i64,
                instance.version,
                instance.started_at_ms as i64,
                instance.last_heartbeat_ms as i64,
                instance.status.to_string(),
            ],
        )?;
        tracing::info!(executor = %instance.id, host = %instance.hostname, "executor registered");
        Ok(())
    }

    /// Refresh the heartbeat of a running executor.
    pub fn heartbeat(&self, id: &ExecutorId, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE executor_instances SET last_heartbeat = ?1, updated_at = ?1 \
             WHERE instance_id = ?2",
            params![now_ms as i64, id.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::ExecutorNotFound { executor: *id });
        }
        Ok(())
    }

    /// Mark an executor stopped on graceful exit.
    pub fn mark_executor_stopped(&self, id: &ExecutorId, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE executor_instances SET status = 'stopped', updated_at = ?1 \
             WHERE instance_id = ?2",
            params![now_ms as i64, id.as_str()],
        )?;
        Ok(())
    }

    /// One executor row.
    pub fn executor(&self, id: &ExecutorId) -> Result<Option<ExecutorInstance>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT instance_id, hostname, pid, version, started_at, last_heartbeat, status \
                 FROM executor_instances WHERE instance_id = ?1",
                [id.as_str()],
                instance_from_row,
            )
            .optional()?)
    }

    /// All registered executors, most recent heartbeat first.
    pub fn list_executors(&self) -> Result<Vec<ExecutorInstance>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT instance_id, hostname, pid, version, started_at, last_heartbeat, status \
             FROM executor_instances ORDER BY last_heartbeat DESC",
        )?;
        let rows = stmt.query_map([], instance_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Running executors whose heartbeat predates `cutoff_ms`.
    pub fn stale_executors(&self, cutoff_ms: u64) -> Result<Vec<ExecutorInstance>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT instance_id, hostname, pid, version, started_at, last_heartbeat, status \
             FROM executor_instances \
             WHERE status = ?1 AND last_heartbeat < ?2",
        )?;
        let rows = stmt.query_map(
            params![ExecutorStatus::Running.to_string(), cutoff_ms as i64],
            instance_from_row,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
#[path = "executors_tests.rs"]
mod tests;
