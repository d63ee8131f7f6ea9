// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-state row and attempt history records.

use crate::executor::ExecutorId;
use crate::issue::IssueId;
use crate::phase::ExecutionPhase;
use serde::{Deserialize, Serialize};

/// The single execution-state row an issue may have.
///
/// Invariant: while `phase` is active (claimed through committing) the
/// `executor` field is non-null. Checkpoint data survives release and
/// stale-sweep so a re-claim resumes rather than restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStateRow {
    pub issue_id: IssueId,
    pub executor: Option<ExecutorId>,
    pub claimed_at_ms: Option<u64>,
    pub phase: ExecutionPhase,
    /// Opaque agent checkpoint. The state machine stores and returns it
    /// without interpreting it.
    pub checkpoint: Option<String>,
    pub error_message: Option<String>,
    pub updated_at_ms: u64,
    /// Watchdog interventions recorded against this issue.
    pub intervention_count: u32,
    pub last_intervention_ms: Option<u64>,
}

crate::builder! {
    pub struct ExecutionStateRowBuilder => ExecutionStateRow {
        into {
            issue_id: IssueId = "vc-test1",
        }
        set {
            phase: ExecutionPhase = ExecutionPhase::Claimed,
            intervention_count: u32 = 0,
        }
        option {
            executor: ExecutorId = None,
            claimed_at_ms: u64 = None,
            checkpoint: String = None,
            error_message: String = None,
            last_intervention_ms: u64 = None,
        }
        computed {
            updated_at_ms: u64 = 1_000_000,
        }
    }
}

/// Append-only record of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// Rowid assigned by the store; 0 until persisted.
    pub id: i64,
    pub issue_id: IssueId,
    pub executor: ExecutorId,
    pub started_at_ms: u64,
    pub finished_at_ms: Option<u64>,
    pub success: Option<bool>,
    pub exit_code: Option<i32>,
    pub summary: Option<String>,
}
