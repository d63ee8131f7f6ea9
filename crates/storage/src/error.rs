// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.
//!
//! Contract violations (missing acceptance criteria, invalid transitions,
//! stale iterations) are non-retryable and surface verbatim. Busy/locked
//! database errors are retried inside the store and only escape as
//! [`StoreError::Busy`] after the retry budget is spent.

use fm_core::{ExecutionPhase, ExecutorId, IssueId, IssueType};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The handle was closed; every later call fails with this.
    #[error("database is closed")]
    Closed,

    /// The canonical JSONL export is newer than the database.
    #[error(
        "issue export {export} is newer than the database; \
         re-import it before dispatching work"
    )]
    StaleExport { export: PathBuf },

    /// SQLITE_BUSY/SQLITE_LOCKED survived the retry budget.
    #[error("database busy after {attempts} attempts: {source}")]
    Busy {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("issue {issue} not found")]
    IssueNotFound { issue: IssueId },

    #[error("executor {executor} not registered")]
    ExecutorNotFound { executor: ExecutorId },

    #[error("no execution state for issue {issue}")]
    ExecutionStateNotFound { issue: IssueId },

    /// Claim refused: acceptance_criteria is required for this issue type.
    #[error(
        "issue {issue} cannot be claimed: acceptance_criteria is required \
         for {issue_type} issues"
    )]
    AcceptanceCriteriaRequired { issue: IssueId, issue_type: IssueType },

    #[error("issue {issue} already claimed by {executor}")]
    AlreadyClaimed { issue: IssueId, executor: String },

    #[error("issue {issue} is not open")]
    NotOpen { issue: IssueId },

    #[error(
        "invalid state transition for {issue}: {from} -> {to} \
         (valid transitions from {from}: {valid})"
    )]
    InvalidTransition {
        issue: IssueId,
        from: ExecutionPhase,
        to: ExecutionPhase,
        valid: String,
    },

    #[error("invalid initial state {phase} for {issue}: must be pending or claimed")]
    InvalidInitialPhase { issue: IssueId, phase: ExecutionPhase },

    /// Adding the edge would close a cycle in the `blocks` subgraph.
    #[error("dependency {issue} -> {depends_on} would create a blocks cycle")]
    DependencyCycle { issue: IssueId, depends_on: IssueId },

    /// Optimistic-concurrency mismatch on a plan write. Callers refetch
    /// and retry at their own layer.
    #[error(
        "stale plan iteration for mission {mission}: expected {expected}, found {found}"
    )]
    StaleIteration { mission: IssueId, expected: u32, found: u32 },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for the plan-store optimistic-lock sentinel.
    pub fn is_stale_iteration(&self) -> bool {
        matches!(self, StoreError::StaleIteration { .. })
    }

    /// True when a claim failed because another executor holds or raced
    /// the issue. Dispatchers treat these as "move on to the next issue".
    pub fn is_claim_contention(&self) -> bool {
        matches!(
            self,
            StoreError::AlreadyClaimed { .. } | StoreError::NotOpen { .. } | StoreError::Busy { .. }
        )
    }
}

/// Parse a text column into an enum, mapping failures onto rusqlite's
/// conversion error so they surface through `query_map` closures.
pub(crate) fn text_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}
