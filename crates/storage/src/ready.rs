// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ready-work projection: which issues an executor may claim next.

use crate::db::Database;
use crate::issues::{issue_from_row, labels_for_conn, placeholders, BATCH_CHUNK};
use crate::Result;
use fm_core::{label, Issue, IssueId, MissionContext};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;

/// Upper bound on parent-child hops when resolving an issue's enclosing
/// mission. Also serves as the cycle guard for the recursive walk.
const PARENT_WALK_DEPTH: u32 = 10;

/// Ordering policy for ready work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadySort {
    /// Priority ascending, then oldest first. The default.
    #[default]
    Priority,
    /// Oldest first regardless of priority.
    Oldest,
}

/// Filter for the ready-work query.
#[derive(Debug, Clone)]
pub struct ReadyFilter {
    pub limit: usize,
    /// Only issues at this priority or more urgent (smaller number).
    pub max_priority: Option<i32>,
    pub sort: ReadySort,
}

impl Default for ReadyFilter {
    fn default() -> Self {
        Self { limit: 50, max_priority: None, sort: ReadySort::Priority }
    }
}

/// A claimable issue with its enclosing mission context, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyIssue {
    pub issue: Issue,
    pub mission: Option<MissionContext>,
}

impl Database {
    /// Issues eligible to claim, in dispatch order.
    ///
    /// An issue qualifies when it is open, not an epic, has no non-closed
    /// `blocks` dependency, does not carry `no-auto-claim`, and its
    /// enclosing mission (nearest `parent-child` epic ancestor with
    /// subtype `mission`, found by one bounded recursive walk) is not
    /// gated by `needs-quality-gates`.
    pub fn ready_work(&self, filter: &ReadyFilter) -> Result<Vec<ReadyIssue>> {
        let conn = self.conn()?;

        // Overfetch before label filtering so a page of suppressed issues
        // cannot starve the result.
        let scan_limit = filter.limit.saturating_mul(4).max(64);
        let order = match filter.sort {
            ReadySort::Priority => "i.priority ASC, i.created_at ASC",
            ReadySort::Oldest => "i.created_at ASC",
        };
        let sql = format!(
            "SELECT i.id, i.title, i.description, i.acceptance_criteria, \
                    i.issue_type, i.status, i.priority, i.created_at, i.updated_at, \
                    i.closed_at, ms.subtype \
             FROM issues i \
             LEFT JOIN mission_state ms ON ms.issue_id = i.id \
             WHERE i.status = 'open' \
               AND i.issue_type != 'epic' \
               AND (?1 IS NULL OR i.priority <= ?1) \
               AND NOT EXISTS ( \
                   SELECT 1 FROM dependencies d \
                   JOIN issues b ON b.id = d.depends_on_id \
                   WHERE d.issue_id = i.id \
                     AND d.dep_type = 'blocks' \
                     AND b.status != 'closed' \
               ) \
             ORDER BY {order} \
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![filter.max_priority, scan_limit as i64],
            issue_from_row,
        )?;
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }

        // One labels query for the whole candidate set.
        let ids: Vec<IssueId> = candidates.iter().map(|i| i.id).collect();
        let labels = labels_for_conn(&conn, &ids)?;
        candidates.retain(|i| {
            labels
                .get(&i.id)
                .is_none_or(|ls| !ls.iter().any(|l| l == label::NO_AUTO_CLAIM))
        });

        // Resolve enclosing missions for what's left, then drop issues
        // whose mission is gated.
        let ids: Vec<IssueId> = candidates.iter().map(|i| i.id).collect();
        let missions = resolve_missions(&conn, &ids)?;
        let mission_ids: Vec<IssueId> = {
            let mut unique: Vec<IssueId> = missions.values().copied().collect();
            unique.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
            unique.dedup();
            unique
        };
        let mission_labels = labels_for_conn(&conn, &mission_ids)?;
        let contexts = mission_contexts(&conn, &mission_ids)?;

        let mut out = Vec::with_capacity(candidates.len());
        for issue in candidates {
            let mission = missions.get(&issue.id).copied();
            if let Some(mid) = mission {
                let gated = mission_labels
                    .get(&mid)
                    .is_some_and(|ls| ls.iter().any(|l| l == label::NEEDS_QUALITY_GATES));
                if gated {
                    continue;
                }
            }
            let context = mission.map(|mid| {
                contexts.get(&mid).cloned().unwrap_or(MissionContext {
                    mission_id: mid,
                    sandbox_path: None,
                    branch: None,
                })
            });
            out.push(ReadyIssue { issue, mission: context });
            if out.len() == filter.limit {
                break;
            }
        }
        Ok(out)
    }

    /// Open, unblocked issues carrying `discovered:blocker`, most urgent
    /// first. Single query; served ahead of the normal ready pool.
    pub fn ready_blockers(&self, limit: usize) -> Result<Vec<Issue>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.title, i.description, i.acceptance_criteria, \
                    i.issue_type, i.status, i.priority, i.created_at, i.updated_at, \
                    i.closed_at, ms.subtype \
             FROM issues i \
             JOIN labels l ON l.issue_id = i.id AND l.label = ?1 \
             LEFT JOIN mission_state ms ON ms.issue_id = i.id \
             WHERE i.status = 'open' \
               AND i.issue_type != 'epic' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM dependencies d \
                   JOIN issues b ON b.id = d.depends_on_id \
                   WHERE d.issue_id = i.id \
                     AND d.dep_type = 'blocks' \
                     AND b.status != 'closed' \
               ) \
             ORDER BY i.priority ASC, i.created_at ASC \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![label::DISCOVERED_BLOCKER, limit as i64],
            issue_from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Map each issue to its nearest mission ancestor via one recursive
/// `parent-child` walk, depth-bounded at [`PARENT_WALK_DEPTH`].
fn resolve_missions(
    conn: &Connection,
    ids: &[IssueId],
) -> Result<HashMap<IssueId, IssueId>> {
    let mut out = HashMap::new();
    for chunk in ids.chunks(BATCH_CHUNK) {
        let sql = format!(
            "WITH RECURSIVE walk(start_id, ancestor_id, depth) AS ( \
                 SELECT d.issue_id, d.depends_on_id, 1 \
                   FROM dependencies d \
                  WHERE d.dep_type = 'parent-child' \
                    AND d.issue_id IN ({ph}) \
                 UNION \
                 SELECT w.start_id, d.depends_on_id, w.depth + 1 \
                   FROM walk w \
                   JOIN dependencies d \
                     ON d.issue_id = w.ancestor_id AND d.dep_type = 'parent-child' \
                  WHERE w.depth < {depth} \
             ) \
             SELECT w.start_id, w.ancestor_id, MIN(w.depth) \
               FROM walk w \
               JOIN issues i ON i.id = w.ancestor_id AND i.issue_type = 'epic' \
               JOIN mission_state ms \
                 ON ms.issue_id = w.ancestor_id AND ms.subtype = 'mission' \
              GROUP BY w.start_id",
            ph = placeholders(chunk.len()),
            depth = PARENT_WALK_DEPTH,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().map(|id| id.as_str())),
            |row| {
                Ok((
                    IssueId::from_string(row.get::<_, String>(0)?),
                    IssueId::from_string(row.get::<_, String>(1)?),
                ))
            },
        )?;
        for row in rows {
            let (start, mission) = row?;
            out.insert(start, mission);
        }
    }
    Ok(out)
}

/// Batch-load the dispatch context (sandbox, branch) of each mission.
fn mission_contexts(
    conn: &Connection,
    mission_ids: &[IssueId],
) -> Result<HashMap<IssueId, MissionContext>> {
    let mut out = HashMap::new();
    for chunk in mission_ids.chunks(BATCH_CHUNK) {
        let sql = format!(
            "SELECT issue_id, sandbox_path, branch FROM mission_state \
             WHERE issue_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(chunk.iter().map(|id| id.as_str())),
            |row| {
                let id = IssueId::from_string(row.get::<_, String>(0)?);
                Ok((
                    id,
                    MissionContext {
                        mission_id: id,
                        sandbox_path: row.get::<_, Option<String>>(1)?.map(PathBuf::from),
                        branch: row.get(2)?,
                    },
                ))
            },
        )?;
        for row in rows {
            let (id, ctx) = row?;
            out.insert(id, ctx);
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "ready_tests.rs"]
mod tests;
