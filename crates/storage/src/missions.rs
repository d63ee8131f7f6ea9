// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission extension-table access.

use crate::db::Database;
use crate::error::text_column;
use crate::Result;
use fm_core::{IssueId, MissionRecord};
use rusqlite::{params, OptionalExtension, Row};
use std::path::PathBuf;

fn mission_from_row(row: &Row<'_>) -> rusqlite::Result<MissionRecord> {
    Ok(MissionRecord {
        issue_id: IssueId::from_string(row.get::<_, String>(0)?),
        subtype: text_column(1, row.get::<_, String>(1)?)?,
        goal: row.get(2)?,
        sandbox_path: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
        branch: row.get(4)?,
        phase_count: row.get::<_, i64>(5)? as u32,
        current_phase: row.get::<_, i64>(6)? as u32,
        approval: text_column(7, row.get::<_, String>(7)?)?,
        updated_at_ms: row.get::<_, i64>(8)? as u64,
    })
}

impl Database {
    /// Upsert the extension record for an issue (subtype + mission
    /// metadata).
    pub fn set_mission_state(&self, record: &MissionRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO mission_state (issue_id, subtype, goal, sandbox_path, branch, \
             phase_count, current_phase, approval, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(issue_id) DO UPDATE SET \
                 subtype = excluded.subtype, \
                 goal = excluded.goal, \
                 sandbox_path = excluded.sandbox_path, \
                 branch = excluded.branch, \
                 phase_count = excluded.phase_count, \
                 current_phase = excluded.current_phase, \
                 approval = excluded.approval, \
                 updated_at = excluded.updated_at",
            params![
                record.issue_id.as_str(),
                record.subtype.to_string(),
                record.goal,
                record.sandbox_path.as_ref().map(|p| p.display().to_string()),
                record.branch,
                record.phase_count as i64,
                record.current_phase as i64,
                record.approval.to_string(),
                record.updated_at_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// The extension record for an issue, if any.
    pub fn mission_state(&self, id: &IssueId) -> Result<Option<MissionRecord>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT issue_id, subtype, goal, sandbox_path, branch, phase_count, \
                 current_phase, approval, updated_at \
                 FROM mission_state WHERE issue_id = ?1",
                [id.as_str()],
                mission_from_row,
            )
            .optional()?)
    }
}
