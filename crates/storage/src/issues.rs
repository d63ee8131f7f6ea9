// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue store adapter: CRUD, labels, comments, and dependency edges.

use crate::db::Database;
use crate::error::{text_column, StoreError};
use crate::Result;
use fm_core::{DependencyType, Issue, IssueId, IssueStatus, IssueType, NewIssue};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

/// SQLite's default host-parameter limit is 999; chunk `IN (…)` queries
/// well below it.
pub(crate) const BATCH_CHUNK: usize = 500;

const ISSUE_COLUMNS: &str = "i.id, i.title, i.description, i.acceptance_criteria, \
     i.issue_type, i.status, i.priority, i.created_at, i.updated_at, i.closed_at, \
     ms.subtype";

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub issue_id: IssueId,
    pub author: String,
    pub body: String,
    pub created_at_ms: u64,
}

pub(crate) fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let issue_type: IssueType = text_column(4, row.get::<_, String>(4)?)?;
    let status: IssueStatus = text_column(5, row.get::<_, String>(5)?)?;
    let subtype = match row.get::<_, Option<String>>(10)? {
        Some(s) => Some(text_column(10, s)?),
        None => None,
    };
    Ok(Issue {
        id: IssueId::from_string(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        acceptance_criteria: row.get(3)?,
        issue_type,
        subtype,
        status,
        priority: row.get(6)?,
        created_at_ms: row.get::<_, i64>(7)? as u64,
        updated_at_ms: row.get::<_, i64>(8)? as u64,
        closed_at_ms: row.get::<_, Option<i64>>(9)?.map(|v| v as u64),
    })
}

/// Build `?,?,…` for an `IN` clause of `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

impl Database {
    /// Insert a new issue.
    ///
    /// Tasks and bugs must state acceptance criteria up front so they can
    /// never sit unclaimable in the ready pool.
    pub fn create_issue(&self, new: &NewIssue, now_ms: u64) -> Result<()> {
        if new.issue_type.requires_acceptance_criteria()
            && new.acceptance_criteria.trim().is_empty()
        {
            return Err(StoreError::AcceptanceCriteriaRequired {
                issue: new.id,
                issue_type: new.issue_type,
            });
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO issues (id, title, description, acceptance_criteria, issue_type, \
             status, priority, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'open', ?6, ?7, ?7)",
            params![
                new.id.as_str(),
                new.title,
                new.description,
                new.acceptance_criteria,
                new.issue_type.to_string(),
                new.priority,
                now_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// Fetch one issue, with its subtype resolved from `mission_state`.
    pub fn issue(&self, id: &IssueId) -> Result<Option<Issue>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues i \
             LEFT JOIN mission_state ms ON ms.issue_id = i.id \
             WHERE i.id = ?1"
        );
        Ok(conn
            .query_row(&sql, [id.as_str()], issue_from_row)
            .optional()?)
    }

    /// Batch fetch by ids, chunked to stay under the parameter limit.
    /// Missing ids are silently absent from the result.
    pub fn issues_by_ids(&self, ids: &[IssueId]) -> Result<Vec<Issue>> {
        let conn = self.conn()?;
        let mut out = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_CHUNK) {
            let sql = format!(
                "SELECT {ISSUE_COLUMNS} FROM issues i \
                 LEFT JOIN mission_state ms ON ms.issue_id = i.id \
                 WHERE i.id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(chunk.iter().map(|id| id.as_str())),
                issue_from_row,
            )?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    /// Set an issue's status, touching `updated_at`.
    pub fn set_issue_status(&self, id: &IssueId, status: IssueStatus, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        let closed_at: Option<i64> = match status {
            IssueStatus::Closed => Some(now_ms as i64),
            _ => None,
        };
        let n = conn.execute(
            "UPDATE issues SET status = ?1, closed_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.to_string(), closed_at, now_ms as i64, id.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::IssueNotFound { issue: *id });
        }
        Ok(())
    }

    /// Replace an issue's acceptance criteria.
    ///
    /// Creation validates criteria for tasks and bugs, but edits may
    /// blank them; such issues are refused again at claim time.
    pub fn update_issue_acceptance_criteria(
        &self,
        id: &IssueId,
        criteria: &str,
        now_ms: u64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE issues SET acceptance_criteria = ?1, updated_at = ?2 WHERE id = ?3",
            params![criteria, now_ms as i64, id.as_str()],
        )?;
        if n == 0 {
            return Err(StoreError::IssueNotFound { issue: *id });
        }
        Ok(())
    }

    /// Attach a label. Idempotent.
    pub fn add_label(&self, id: &IssueId, label: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO labels (issue_id, label) VALUES (?1, ?2)",
            params![id.as_str(), label],
        )?;
        Ok(())
    }

    /// Detach a label. Idempotent.
    pub fn remove_label(&self, id: &IssueId, label: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM labels WHERE issue_id = ?1 AND label = ?2",
            params![id.as_str(), label],
        )?;
        Ok(())
    }

    /// Labels for one issue.
    pub fn labels(&self, id: &IssueId) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT label FROM labels WHERE issue_id = ?1 ORDER BY label")?;
        let rows = stmt.query_map([id.as_str()], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(Into::into)
    }

    /// Batch label load: one `IN` query per 500 ids, avoiding N+1 during
    /// ready-work filtering.
    pub fn labels_for(&self, ids: &[IssueId]) -> Result<HashMap<IssueId, Vec<String>>> {
        let conn = self.conn()?;
        labels_for_conn(&conn, ids)
    }

    /// Whether any open issue carries the given label.
    pub fn any_open_issue_with_label(&self, label: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM issues i JOIN labels l ON l.issue_id = i.id \
                 WHERE l.label = ?1 AND i.status != 'closed' LIMIT 1",
                [label],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Append a comment to an issue.
    pub fn add_comment(&self, id: &IssueId, author: &str, body: &str, now_ms: u64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "INSERT INTO comments (issue_id, author, body, created_at) \
             SELECT ?1, ?2, ?3, ?4 WHERE EXISTS (SELECT 1 FROM issues WHERE id = ?1)",
            params![id.as_str(), author, body, now_ms as i64],
        )?;
        if n == 0 {
            return Err(StoreError::IssueNotFound { issue: *id });
        }
        Ok(())
    }

    /// Comments for an issue, oldest first.
    pub fn comments(&self, id: &IssueId) -> Result<Vec<Comment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT issue_id, author, body, created_at FROM comments \
             WHERE issue_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([id.as_str()], |row| {
            Ok(Comment {
                issue_id: IssueId::from_string(row.get::<_, String>(0)?),
                author: row.get(1)?,
                body: row.get(2)?,
                created_at_ms: row.get::<_, i64>(3)? as u64,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Add a typed dependency edge: `issue` depends on `depends_on`.
    ///
    /// `blocks` edges are refused when the reverse direction is already
    /// reachable, keeping the blocks subgraph acyclic.
    pub fn add_dependency(
        &self,
        issue: &IssueId,
        depends_on: &IssueId,
        dep_type: DependencyType,
        now_ms: u64,
    ) -> Result<()> {
        let conn = self.conn()?;
        if dep_type == DependencyType::Blocks && blocks_reaches(&conn, depends_on, issue)? {
            return Err(StoreError::DependencyCycle {
                issue: *issue,
                depends_on: *depends_on,
            });
        }
        conn.execute(
            "INSERT OR IGNORE INTO dependencies (issue_id, depends_on_id, dep_type, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                issue.as_str(),
                depends_on.as_str(),
                dep_type.to_string(),
                now_ms as i64
            ],
        )?;
        Ok(())
    }

    /// Remove a dependency edge. Idempotent.
    pub fn remove_dependency(
        &self,
        issue: &IssueId,
        depends_on: &IssueId,
        dep_type: DependencyType,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM dependencies \
             WHERE issue_id = ?1 AND depends_on_id = ?2 AND dep_type = ?3",
            params![issue.as_str(), depends_on.as_str(), dep_type.to_string()],
        )?;
        Ok(())
    }
}

pub(crate) fn labels_for_conn(
    conn: &Connection,
    ids: &[IssueId],
) -> Result<HashMap<IssueId, Vec<String>>> {
    let mut out: HashMap<IssueId, Vec<String>> = HashMap::new();
    for chunk in ids.chunks(BATCH_CHUNK) {
        let sql = format!(
            "SELECT issue_id, label FROM labels WHERE issue_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().map(|id| id.as_str())),
            |row| {
                Ok((
                    IssueId::from_string(row.get::<_, String>(0)?),
                    row.get::<_, String>(1)?,
                ))
            },
        )?;
        for row in rows {
            let (id, label) = row?;
            out.entry(id).or_default().push(label);
        }
    }
    Ok(out)
}

/// Whether `from` transitively depends on `to` through `blocks` edges.
/// Bounded walk; ten levels of blocking is already pathological.
fn blocks_reaches(conn: &Connection, from: &IssueId, to: &IssueId) -> Result<bool> {
    let found = conn
        .query_row(
            "WITH RECURSIVE reach(id, depth) AS ( \
                 SELECT depends_on_id, 1 FROM dependencies \
                  WHERE issue_id = ?1 AND dep_type = 'blocks' \
                 UNION \
                 SELECT d.depends_on_id, r.depth + 1 \
                   FROM dependencies d JOIN reach r ON d.issue_id = r.id \
                  WHERE d.dep_type = 'blocks' AND r.depth < 10 \
             ) \
             SELECT 1 FROM reach WHERE id = ?2 LIMIT 1",
            params![from.as_str(), to.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some() || from == to)
}

#[cfg(test)]
#[path = "issues_tests.rs"]
mod tests;
