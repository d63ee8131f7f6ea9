// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-event feed records.
//!
//! Append-only activity stream shared by all executor processes. Events
//! carry producer timestamps, so readers see near-but-not-strictly
//! timestamp order across processes.

use crate::executor::ExecutorId;
use crate::issue::IssueId;
use serde::{Deserialize, Serialize};

/// Severity attached to a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

crate::simple_display! {
    EventSeverity {
        Info => "info",
        Warning => "warning",
        Error => "error",
        Critical => "critical",
    }
}

crate::enum_from_str! {
    EventSeverity {
        "info" => Info,
        "warning" => Warning,
        "error" => Error,
        "critical" => Critical,
    }
}

/// What happened, for filtering the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    Claimed,
    PhaseChanged,
    Released,
    StaleSwept,
    InterventionRecorded,
    AttemptFinished,
    BudgetAlert,
    QuotaAlert,
}

crate::simple_display! {
    AgentEventKind {
        Claimed => "claimed",
        PhaseChanged => "phase_changed",
        Released => "released",
        StaleSwept => "stale_swept",
        InterventionRecorded => "intervention_recorded",
        AttemptFinished => "attempt_finished",
        BudgetAlert => "budget_alert",
        QuotaAlert => "quota_alert",
    }
}

crate::enum_from_str! {
    AgentEventKind {
        "claimed" => Claimed,
        "phase_changed" => PhaseChanged,
        "released" => Released,
        "stale_swept" => StaleSwept,
        "intervention_recorded" => InterventionRecorded,
        "attempt_finished" => AttemptFinished,
        "budget_alert" => BudgetAlert,
        "quota_alert" => QuotaAlert,
    }
}

/// One activity-feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    pub severity: EventSeverity,
    pub issue_id: Option<IssueId>,
    pub executor: Option<ExecutorId>,
    pub message: String,
    pub created_at_ms: u64,
}

impl AgentEvent {
    pub fn new(kind: AgentEventKind, message: impl Into<String>, now_ms: u64) -> Self {
        Self {
            kind,
            severity: EventSeverity::Info,
            issue_id: None,
            executor: None,
            message: message.into(),
            created_at_ms: now_ms,
        }
    }

    pub fn severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn issue(mut self, id: impl Into<IssueId>) -> Self {
        self.issue_id = Some(id.into());
        self
    }

    pub fn executor(mut self, id: impl Into<ExecutorId>) -> Self {
        self.executor = Some(id.into());
        self
    }
}
