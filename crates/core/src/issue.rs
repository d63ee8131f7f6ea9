// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue projection: the slice of the embedded tracker the scheduler reads.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Tracker-assigned issue identifier (e.g. `vc-1a2b`).
    ///
    /// Issues created by this control plane (crisis issues, discovered work)
    /// generate their own id; everything else arrives as an opaque string
    /// from the tracker and is wrapped with `from_string`.
    pub struct IssueId("vc-");
}

/// Issue classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Epic,
    Task,
    Bug,
    Chore,
}

crate::simple_display! {
    IssueType {
        Epic => "epic",
        Task => "task",
        Bug => "bug",
        Chore => "chore",
    }
}

crate::enum_from_str! {
    IssueType {
        "epic" => Epic,
        "task" => Task,
        "bug" => Bug,
        "chore" => Chore,
    }
}

impl IssueType {
    /// Task-shaped issues may not be claimed without acceptance criteria.
    pub fn requires_acceptance_criteria(self) -> bool {
        matches!(self, IssueType::Task | IssueType::Bug)
    }
}

/// Scheduler-meaningful refinement of an issue, stored in the
/// `mission_state` extension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSubtype {
    Mission,
    Phase,
    Review,
    Normal,
}

crate::simple_display! {
    IssueSubtype {
        Mission => "mission",
        Phase => "phase",
        Review => "review",
        Normal => "normal",
    }
}

crate::enum_from_str! {
    IssueSubtype {
        "mission" => Mission,
        "phase" => Phase,
        "review" => Review,
        "normal" => Normal,
    }
}

/// Tracker status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Blocked,
    Closed,
}

crate::simple_display! {
    IssueStatus {
        Open => "open",
        InProgress => "in_progress",
        Blocked => "blocked",
        Closed => "closed",
    }
}

crate::enum_from_str! {
    IssueStatus {
        "open" => Open,
        "in_progress" => InProgress,
        "blocked" => Blocked,
        "closed" => Closed,
    }
}

/// Typed, directed dependency edge between two issues.
///
/// The `blocks` subgraph must stay acyclic; the store refuses edges that
/// would close a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    Blocks,
    ParentChild,
    Related,
    DiscoveredFrom,
}

crate::simple_display! {
    DependencyType {
        Blocks => "blocks",
        ParentChild => "parent-child",
        Related => "related",
        DiscoveredFrom => "discovered-from",
    }
}

crate::enum_from_str! {
    DependencyType {
        "blocks" => Blocks,
        "parent-child" => ParentChild,
        "related" => Related,
        "discovered-from" => DiscoveredFrom,
    }
}

/// An issue as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    /// Definition of done. Required (non-whitespace) for tasks and bugs
    /// before they may be claimed.
    pub acceptance_criteria: String,
    pub issue_type: IssueType,
    /// Resolved from the `mission_state` extension table; `None` when the
    /// issue has no extension row.
    pub subtype: Option<IssueSubtype>,
    pub status: IssueStatus,
    /// Smaller is more urgent. 0 is a P0.
    pub priority: i32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub closed_at_ms: Option<u64>,
}

impl Issue {
    /// Whether this issue would pass the claim-time acceptance gate.
    pub fn has_acceptance_criteria(&self) -> bool {
        !self.acceptance_criteria.trim().is_empty()
    }
}

/// Fields for creating an issue.
///
/// Creation validates the acceptance-criteria invariant up front so a
/// task can never enter the ready pool unclaimed-able.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: String,
    pub issue_type: IssueType,
    pub priority: i32,
}

impl NewIssue {
    pub fn new(issue_type: IssueType, title: impl Into<String>) -> Self {
        Self {
            id: IssueId::new(),
            title: title.into(),
            description: String::new(),
            acceptance_criteria: String::new(),
            issue_type,
            priority: 2,
        }
    }

    pub fn id(mut self, id: impl Into<IssueId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn description(mut self, v: impl Into<String>) -> Self {
        self.description = v.into();
        self
    }

    pub fn acceptance_criteria(mut self, v: impl Into<String>) -> Self {
        self.acceptance_criteria = v.into();
        self
    }

    pub fn priority(mut self, v: i32) -> Self {
        self.priority = v;
        self
    }
}

crate::builder! {
    pub struct IssueBuilder => Issue {
        into {
            id: IssueId = "vc-test1",
            title: String = "test issue",
            description: String = "",
            acceptance_criteria: String = "it works",
        }
        set {
            issue_type: IssueType = IssueType::Task,
            status: IssueStatus = IssueStatus::Open,
            priority: i32 = 2,
        }
        option {
            subtype: IssueSubtype = None,
            closed_at_ms: u64 = None,
        }
        computed {
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
