// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Budget accounting state and status.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rolling-window and lifetime usage counters.
///
/// Persisted as a single JSON document; the reader starts fresh when the
/// file is absent or unreadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    pub hourly_tokens_used: u64,
    pub hourly_cost_used: f64,
    pub window_start_ms: u64,
    /// Lifetime tokens attributed per issue id.
    #[serde(default)]
    pub per_issue_tokens: HashMap<String, u64>,
    pub total_tokens_used: u64,
    pub total_cost_used: f64,
    pub last_updated_ms: u64,
}

impl BudgetState {
    /// Number of distinct issues that have recorded usage.
    pub fn unique_issues(&self) -> u32 {
        self.per_issue_tokens.len() as u32
    }
}

/// Health of the current budget window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Healthy,
    Warning,
    Exceeded,
}

crate::simple_display! {
    BudgetStatus {
        Healthy => "healthy",
        Warning => "warning",
        Exceeded => "exceeded",
    }
}

/// Outcome of one `record_usage` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub status: BudgetStatus,
    pub tokens: u64,
    pub cost: f64,
    pub hourly_tokens_used: u64,
    pub hourly_cost_used: f64,
}
