// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only agent activity feed.

use crate::claim::append_event_tx;
use crate::db::Database;
use crate::error::text_column;
use crate::Result;
use fm_core::{AgentEvent, ExecutorId, IssueId};
use rusqlite::{params, TransactionBehavior};

impl Database {
    /// Append one event to the feed.
    pub fn append_agent_event(&self, event: &AgentEvent) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        append_event_tx(&tx, event)?;
        tx.commit()?;
        Ok(())
    }

    /// Events at or after `since_ms`, oldest first.
    ///
    /// Producer timestamps come from different processes, so readers see
    /// near-but-not-strictly timestamp order; insertion id breaks ties.
    pub fn agent_events_since(&self, since_ms: u64, limit: usize) -> Result<Vec<AgentEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, severity, issue_id, executor_instance_id, message, created_at \
             FROM agent_events WHERE created_at >= ?1 ORDER BY created_at, id LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![since_ms as i64, limit as i64], |row| {
            Ok(AgentEvent {
                kind: text_column(0, row.get::<_, String>(0)?)?,
                severity: text_column(1, row.get::<_, String>(1)?)?,
                issue_id: row.get::<_, Option<String>>(2)?.map(IssueId::from_string),
                executor: row.get::<_, Option<String>>(3)?.map(ExecutorId::from_string),
                message: row.get(4)?,
                created_at_ms: row.get::<_, i64>(5)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
