// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission metadata and the context attached to dispatched issues.

use crate::issue::{IssueId, IssueSubtype};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Human approval state of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
}

crate::simple_display! {
    ApprovalState {
        Pending => "pending",
        Approved => "approved",
    }
}

crate::enum_from_str! {
    ApprovalState {
        "pending" => Pending,
        "approved" => Approved,
    }
}

/// Extension-table record for an issue with a subtype.
///
/// Missions (epics with subtype `mission`) carry the full metadata set;
/// phases and reviews only use `subtype` and `updated_at_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionRecord {
    pub issue_id: IssueId,
    pub subtype: IssueSubtype,
    pub goal: String,
    pub sandbox_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub phase_count: u32,
    pub current_phase: u32,
    pub approval: ApprovalState,
    pub updated_at_ms: u64,
}

impl MissionRecord {
    /// Minimal record marking an issue with a subtype.
    pub fn subtype_only(issue_id: IssueId, subtype: IssueSubtype, now_ms: u64) -> Self {
        Self {
            issue_id,
            subtype,
            goal: String::new(),
            sandbox_path: None,
            branch: None,
            phase_count: 0,
            current_phase: 0,
            approval: ApprovalState::Pending,
            updated_at_ms: now_ms,
        }
    }
}

/// Mission context attached to each issue returned by the ready-work
/// projection: where the executor should run and on what branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionContext {
    pub mission_id: IssueId,
    pub sandbox_path: Option<PathBuf>,
    pub branch: Option<String>,
}
