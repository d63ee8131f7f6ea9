// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Budget tracker: rolling-window token/cost accounting.
//!
//! One mutex guards the counters for the whole `record_usage` critical
//! section so `can_proceed` always observes a consistent window. The
//! state file is per-process; `quota_operations` rows in the database are
//! the durable multi-process record.

use crate::config::BudgetConfig;
use crate::monitor::QuotaMonitor;
use fm_core::{
    BudgetState, BudgetStatus, Clock, IssueId, OperationType, QuotaOperation, SystemClock,
    UsageReport,
};
use fm_storage::Database;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Minimum gap between repeated budget alert log lines.
const ALERT_LOG_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Outcome of a `can_proceed` check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { reason: String },
}

impl Admission {
    pub fn allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    fn denied(reason: impl Into<String>) -> Self {
        Admission::Denied { reason: reason.into() }
    }
}

/// Throttles WARNING/EXCEEDED log lines: warnings at most once per window
/// and never more often than every five minutes; exceeded every five
/// minutes.
#[derive(Debug, Default)]
pub(crate) struct AlertThrottle {
    warning_logged_this_window: bool,
    last_warning_ms: Option<u64>,
    last_exceeded_ms: Option<u64>,
}

impl AlertThrottle {
    /// Called when the window resets.
    pub(crate) fn reset_window(&mut self) {
        self.warning_logged_this_window = false;
    }

    /// Whether this status change should produce a log line now.
    pub(crate) fn should_log(&mut self, status: BudgetStatus, now_ms: u64) -> bool {
        let interval = ALERT_LOG_INTERVAL.as_millis() as u64;
        match status {
            BudgetStatus::Healthy => false,
            BudgetStatus::Warning => {
                if self.warning_logged_this_window {
                    return false;
                }
                if self
                    .last_warning_ms
                    .is_some_and(|t| now_ms.saturating_sub(t) < interval)
                {
                    return false;
                }
                self.warning_logged_this_window = true;
                self.last_warning_ms = Some(now_ms);
                true
            }
            BudgetStatus::Exceeded => {
                if self
                    .last_exceeded_ms
                    .is_some_and(|t| now_ms.saturating_sub(t) < interval)
                {
                    return false;
                }
                self.last_exceeded_ms = Some(now_ms);
                true
            }
        }
    }
}

struct TrackerInner {
    state: BudgetState,
    throttle: AlertThrottle,
}

/// Token and cost accounting for AI calls.
pub struct BudgetTracker<C: Clock = SystemClock> {
    config: BudgetConfig,
    clock: C,
    /// For best-effort issue comments and durable per-call records.
    db: Option<Arc<Database>>,
    monitor: Option<Arc<QuotaMonitor<C>>>,
    inner: Mutex<TrackerInner>,
}

impl<C: Clock> BudgetTracker<C> {
    /// Create a tracker, reloading persisted state when configured.
    ///
    /// A missing state file starts fresh; a malformed one logs a warning
    /// and starts fresh.
    pub fn new(config: BudgetConfig, clock: C) -> Self {
        let mut state = config
            .persist_path
            .as_deref()
            .and_then(load_state)
            .unwrap_or_default();
        if state.window_start_ms == 0 {
            state.window_start_ms = clock.epoch_ms();
        }
        Self {
            config,
            clock,
            db: None,
            monitor: None,
            inner: Mutex::new(TrackerInner { state, throttle: AlertThrottle::default() }),
        }
    }

    /// Attach the database for issue comments and durable call records.
    pub fn with_db(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    /// Attach the quota monitor invoked after each recorded call.
    pub fn with_monitor(mut self, monitor: Arc<QuotaMonitor<C>>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Record one AI call.
    ///
    /// Rolls the window when the reset interval elapsed, accumulates
    /// tokens and cost, persists the state (best-effort), logs throttled
    /// alerts, comments on the issue (best-effort), and feeds the quota
    /// monitor.
    pub fn record_usage(
        &self,
        issue_id: Option<&IssueId>,
        input_tokens: u64,
        output_tokens: u64,
    ) -> UsageReport {
        if !self.config.enabled {
            return UsageReport {
                status: BudgetStatus::Healthy,
                tokens: 0,
                cost: 0.0,
                hourly_tokens_used: 0,
                hourly_cost_used: 0.0,
            };
        }

        let now_ms = self.clock.epoch_ms();
        let tokens = input_tokens + output_tokens;
        let cost = input_tokens as f64 * self.config.input_cost_per_mtok / 1e6
            + output_tokens as f64 * self.config.output_cost_per_mtok / 1e6;

        let mut inner = self.inner.lock();

        let window_elapsed = now_ms.saturating_sub(inner.state.window_start_ms);
        if window_elapsed >= self.config.reset_interval.as_millis() as u64 {
            tracing::debug!(
                window_tokens = inner.state.hourly_tokens_used,
                "budget window reset"
            );
            inner.state.hourly_tokens_used = 0;
            inner.state.hourly_cost_used = 0.0;
            inner.state.window_start_ms = now_ms;
            inner.throttle.reset_window();
        }

        inner.state.hourly_tokens_used += tokens;
        inner.state.hourly_cost_used += cost;
        inner.state.total_tokens_used += tokens;
        inner.state.total_cost_used += cost;
        inner.state.last_updated_ms = now_ms;
        if let Some(issue) = issue_id.filter(|id| !id.is_empty()) {
            *inner
                .state
                .per_issue_tokens
                .entry(issue.as_str().to_string())
                .or_insert(0) += tokens;
        }

        if let Some(path) = self.config.persist_path.as_deref() {
            if let Err(e) = persist_state(path, &inner.state) {
                tracing::warn!(error = %e, path = %path.display(), "failed to persist budget state");
            }
        }

        let status = self.status_for(&inner.state);
        let report = UsageReport {
            status,
            tokens,
            cost,
            hourly_tokens_used: inner.state.hourly_tokens_used,
            hourly_cost_used: inner.state.hourly_cost_used,
        };

        if inner.throttle.should_log(status, now_ms) {
            match status {
                BudgetStatus::Warning => tracing::warn!(
                    hourly_tokens = report.hourly_tokens_used,
                    hourly_cost = report.hourly_cost_used,
                    "budget approaching configured limit"
                ),
                BudgetStatus::Exceeded => tracing::error!(
                    hourly_tokens = report.hourly_tokens_used,
                    hourly_cost = report.hourly_cost_used,
                    "budget limit exceeded"
                ),
                BudgetStatus::Healthy => {}
            }
        }

        if let (Some(db), Some(issue)) = (self.db.as_deref(), issue_id) {
            let body = format!(
                "usage: +{tokens} tokens (${cost:.4}); window {}/{} tokens",
                report.hourly_tokens_used,
                if self.config.max_tokens_per_hour > 0 {
                    self.config.max_tokens_per_hour.to_string()
                } else {
                    "unlimited".to_string()
                }
            );
            if let Err(e) = db.add_comment(issue, "budget", &body, now_ms) {
                tracing::debug!(error = %e, issue = %issue, "budget comment skipped");
            }
        }

        if let Some(monitor) = self.monitor.as_deref() {
            monitor.observe(&inner.state);
        }

        report
    }

    /// Record one AI call with operation metadata, additionally appending
    /// a durable `quota_operations` row (best-effort).
    pub fn record_operation(
        &self,
        issue_id: Option<&IssueId>,
        operation: OperationType,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> UsageReport {
        let report = self.record_usage(issue_id, input_tokens, output_tokens);
        if let Some(db) = self.db.as_deref() {
            let op = QuotaOperation {
                issue_id: issue_id.copied(),
                operation,
                model: model.to_string(),
                input_tokens,
                output_tokens,
                cost: report.cost,
                recorded_at_ms: self.clock.epoch_ms(),
            };
            if let Err(e) = db.append_quota_operation(&op) {
                tracing::warn!(error = %e, "failed to append quota operation");
            }
        }
        report
    }

    /// Current health of the window.
    pub fn budget_status(&self) -> BudgetStatus {
        let inner = self.inner.lock();
        self.status_for(&inner.state)
    }

    /// Whether an AI call for `issue_id` may start.
    ///
    /// Refuses when a configured hourly limit is exhausted (naming the
    /// limit) or when the issue hit its per-issue token cap.
    pub fn can_proceed(&self, issue_id: &IssueId) -> Admission {
        if !self.config.enabled {
            return Admission::Allowed;
        }
        let inner = self.inner.lock();
        let state = &inner.state;

        if self.config.max_tokens_per_hour > 0
            && state.hourly_tokens_used >= self.config.max_tokens_per_hour
        {
            return Admission::denied(format!(
                "hourly token budget exhausted ({}/{})",
                state.hourly_tokens_used, self.config.max_tokens_per_hour
            ));
        }
        if self.config.max_cost_per_hour > 0.0
            && state.hourly_cost_used >= self.config.max_cost_per_hour
        {
            return Admission::denied(format!(
                "hourly cost budget exhausted (${:.2}/${:.2})",
                state.hourly_cost_used, self.config.max_cost_per_hour
            ));
        }
        if self.config.max_tokens_per_issue > 0 {
            let used = state.per_issue_tokens.get(issue_id.as_str()).copied().unwrap_or(0);
            if used >= self.config.max_tokens_per_issue {
                return Admission::denied(format!(
                    "issue {issue_id} hit its token cap ({used}/{})",
                    self.config.max_tokens_per_issue
                ));
            }
        }
        Admission::Allowed
    }

    /// A copy of the current counters.
    pub fn state(&self) -> BudgetState {
        self.inner.lock().state.clone()
    }

    fn status_for(&self, state: &BudgetState) -> BudgetStatus {
        let token_fraction = self.config.token_fraction(state.hourly_tokens_used);
        let cost_fraction = self.config.cost_fraction(state.hourly_cost_used);

        if token_fraction.is_some_and(|f| f >= 1.0) || cost_fraction.is_some_and(|f| f >= 1.0) {
            return BudgetStatus::Exceeded;
        }
        let threshold = self.config.alert_threshold;
        if token_fraction.is_some_and(|f| f >= threshold)
            || cost_fraction.is_some_and(|f| f >= threshold)
        {
            return BudgetStatus::Warning;
        }
        BudgetStatus::Healthy
    }
}

/// Read persisted state; absent or malformed files start fresh.
fn load_state(path: &Path) -> Option<BudgetState> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to read budget state");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "malformed budget state, starting fresh");
            None
        }
    }
}

/// Serialize and write-then-rename so readers never see a torn file.
fn persist_state(path: &Path, state: &BudgetState) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
