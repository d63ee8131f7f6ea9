// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission plan document with an optimistic-concurrency iteration counter.

use crate::issue::IssueId;
use serde::{Deserialize, Serialize};

/// Review status of a mission plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Refining,
    Validated,
    Approved,
}

crate::simple_display! {
    PlanStatus {
        Draft => "draft",
        Refining => "refining",
        Validated => "validated",
        Approved => "approved",
    }
}

crate::enum_from_str! {
    PlanStatus {
        "draft" => Draft,
        "refining" => Refining,
        "validated" => Validated,
        "approved" => Approved,
    }
}

/// A stored plan, one row per mission.
///
/// `iteration` strictly increases with each successful write and is the
/// optimistic-concurrency token for refinement races.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub mission_id: IssueId,
    pub status: PlanStatus,
    /// Serialized plan document. The store does not interpret it.
    pub body: String,
    pub iteration: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// The writable fields of a plan, passed to `store_plan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDraft {
    pub mission_id: IssueId,
    pub status: PlanStatus,
    pub body: String,
}

impl PlanDraft {
    pub fn new(mission_id: impl Into<IssueId>, body: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            status: PlanStatus::Draft,
            body: body.into(),
        }
    }

    pub fn status(mut self, status: PlanStatus) -> Self {
        self.status = status;
        self
    }
}
