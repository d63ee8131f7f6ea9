// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quota snapshots, per-call attribution records, and burn-rate output.

use crate::budget::BudgetState;
use crate::event::EventSeverity;
use crate::issue::IssueId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for one captured quota snapshot.
    pub struct SnapshotId("snp-");
}

/// Immutable point-in-time copy of the budget counters.
///
/// The monitor retains the last 20 in memory; all snapshots are also
/// appended durably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub id: SnapshotId,
    pub taken_at_ms: u64,
    pub hourly_tokens_used: u64,
    pub hourly_cost_used: f64,
    pub total_tokens_used: u64,
    pub total_cost_used: f64,
    /// Distinct issues with recorded usage at capture time.
    pub unique_issues: u32,
}

impl QuotaSnapshot {
    pub fn capture(state: &BudgetState, now_ms: u64) -> Self {
        Self {
            id: SnapshotId::new(),
            taken_at_ms: now_ms,
            hourly_tokens_used: state.hourly_tokens_used,
            hourly_cost_used: state.hourly_cost_used,
            total_tokens_used: state.total_tokens_used,
            total_cost_used: state.total_cost_used,
            unique_issues: state.unique_issues(),
        }
    }
}

/// What kind of AI call a usage record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Assessment,
    Execution,
    Analysis,
    Deduplication,
    Planning,
    Review,
    Other,
}

crate::simple_display! {
    OperationType {
        Assessment => "assessment",
        Execution => "execution",
        Analysis => "analysis",
        Deduplication => "deduplication",
        Planning => "planning",
        Review => "review",
        Other => "other",
    }
}

crate::enum_from_str! {
    OperationType {
        "assessment" => Assessment,
        "execution" => Execution,
        "analysis" => Analysis,
        "deduplication" => Deduplication,
        "planning" => Planning,
        "review" => Review,
        "other" => Other,
    }
}

/// Append-only attribution of one AI call to an issue and operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaOperation {
    pub issue_id: Option<IssueId>,
    pub operation: OperationType,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub recorded_at_ms: u64,
}

/// Escalation level derived from predicted time to limit.
///
/// Ordering is by severity: `Green < Yellow < Orange < Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

crate::simple_display! {
    AlertLevel {
        Green => "green",
        Yellow => "yellow",
        Orange => "orange",
        Red => "red",
    }
}

impl AlertLevel {
    /// Severity used when the alert is appended to the agent-event feed.
    pub fn severity(self) -> EventSeverity {
        match self {
            AlertLevel::Green => EventSeverity::Info,
            AlertLevel::Yellow => EventSeverity::Warning,
            AlertLevel::Orange => EventSeverity::Error,
            AlertLevel::Red => EventSeverity::Critical,
        }
    }
}

/// Time-to-limit thresholds (minutes) separating the alert levels.
///
/// Invariant: `red < orange < yellow`. Construction refuses anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub yellow_minutes: f64,
    pub orange_minutes: f64,
    pub red_minutes: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self { yellow_minutes: 30.0, orange_minutes: 15.0, red_minutes: 5.0 }
    }
}

impl AlertThresholds {
    /// Validated constructor; returns `None` when the ordering invariant
    /// does not hold.
    pub fn new(yellow_minutes: f64, orange_minutes: f64, red_minutes: f64) -> Option<Self> {
        if red_minutes > 0.0 && red_minutes < orange_minutes && orange_minutes < yellow_minutes {
            Some(Self { yellow_minutes, orange_minutes, red_minutes })
        } else {
            None
        }
    }

    /// Classify a predicted time-to-limit.
    pub fn classify(&self, time_to_limit_minutes: f64) -> AlertLevel {
        if time_to_limit_minutes < self.red_minutes {
            AlertLevel::Red
        } else if time_to_limit_minutes < self.orange_minutes {
            AlertLevel::Orange
        } else if time_to_limit_minutes < self.yellow_minutes {
            AlertLevel::Yellow
        } else {
            AlertLevel::Green
        }
    }
}

/// Result of the linear burn-rate calculation over recent snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnRate {
    pub tokens_per_minute: f64,
    pub cost_per_minute: f64,
    /// Minutes until the nearest configured limit at the current rate,
    /// capped at 24 hours when no positive burn exists.
    pub time_to_limit_minutes: f64,
    /// `min(sample_count / 5, 1.0)`; alerts are suppressed at ≤ 0.5.
    pub confidence: f64,
    pub level: AlertLevel,
    pub sample_count: usize,
}

impl BurnRate {
    /// The zero-information result used when fewer than two snapshots
    /// fall inside the regression window.
    pub fn unknown() -> Self {
        Self {
            tokens_per_minute: 0.0,
            cost_per_minute: 0.0,
            time_to_limit_minutes: f64::from(24 * 60),
            confidence: 0.0,
            level: AlertLevel::Green,
            sample_count: 0,
        }
    }
}

#[cfg(test)]
#[path = "quota_tests.rs"]
mod tests;
