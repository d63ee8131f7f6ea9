// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quota monitor: snapshot ring, burn-rate prediction, escalating alerts.

use crate::config::{BudgetConfig, QuotaConfig};
use fm_core::{
    label, AgentEvent, AgentEventKind, AlertLevel, BudgetState, BurnRate, Clock, IssueType,
    NewIssue, QuotaSnapshot, SystemClock,
};
use fm_storage::Database;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Snapshots retained in memory for burn-rate regression.
const RING_CAPACITY: usize = 20;

/// Regression window: only snapshots this recent feed the burn rate.
const BURN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Cap on the predicted time-to-limit when no positive burn exists.
const TIME_TO_LIMIT_CAP_MINUTES: f64 = 24.0 * 60.0;

/// Alerts repeat at most this often at the same level; downgrades are
/// also suppressed within this window.
const ALERT_REPEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Samples needed for full confidence.
const FULL_CONFIDENCE_SAMPLES: f64 = 5.0;

/// Alerts with confidence at or below this are suppressed.
const MIN_ALERT_CONFIDENCE: f64 = 0.5;

struct MonitorInner {
    ring: VecDeque<QuotaSnapshot>,
    last_snapshot_ms: Option<u64>,
    last_alert_level: AlertLevel,
    last_alert_ms: Option<u64>,
}

/// Predicts quota exhaustion from the budget counters.
pub struct QuotaMonitor<C: Clock = SystemClock> {
    config: QuotaConfig,
    /// Hourly limits copied from the budget configuration.
    max_tokens_per_hour: u64,
    max_cost_per_hour: f64,
    db: Arc<Database>,
    clock: C,
    inner: Mutex<MonitorInner>,
}

impl<C: Clock> QuotaMonitor<C> {
    pub fn new(config: QuotaConfig, budget: &BudgetConfig, db: Arc<Database>, clock: C) -> Self {
        Self {
            config,
            max_tokens_per_hour: budget.max_tokens_per_hour,
            max_cost_per_hour: budget.max_cost_per_hour,
            db,
            clock,
            inner: Mutex::new(MonitorInner {
                ring: VecDeque::with_capacity(RING_CAPACITY),
                last_snapshot_ms: None,
                last_alert_level: AlertLevel::Green,
                last_alert_ms: None,
            }),
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Called after each recorded usage. Captures a snapshot when the
    /// interval elapsed, then recomputes the burn rate and may alert.
    pub fn observe(&self, state: &BudgetState) {
        if !self.config.enabled {
            return;
        }
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        let interval = self.config.snapshot_interval.as_millis() as u64;
        if inner
            .last_snapshot_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < interval)
        {
            return;
        }

        let snapshot = QuotaSnapshot::capture(state, now_ms);
        if let Err(e) = self.db.append_quota_snapshot(&snapshot) {
            tracing::warn!(error = %e, "failed to persist quota snapshot");
        }
        inner.ring.push_back(snapshot);
        while inner.ring.len() > RING_CAPACITY {
            inner.ring.pop_front();
        }
        inner.last_snapshot_ms = Some(now_ms);

        let burn = self.burn_rate_at(&inner.ring, now_ms);
        self.maybe_alert(&mut inner, &burn, now_ms);
    }

    /// Current burn-rate prediction from the in-memory ring.
    pub fn burn_rate(&self) -> BurnRate {
        let inner = self.inner.lock();
        self.burn_rate_at(&inner.ring, self.clock.epoch_ms())
    }

    fn burn_rate_at(&self, ring: &VecDeque<QuotaSnapshot>, now_ms: u64) -> BurnRate {
        let window_start = now_ms.saturating_sub(BURN_WINDOW.as_millis() as u64);
        let recent: Vec<&QuotaSnapshot> =
            ring.iter().filter(|s| s.taken_at_ms >= window_start).collect();
        if recent.len() < 2 {
            return BurnRate::unknown();
        }

        let oldest = recent[0];
        let newest = recent[recent.len() - 1];
        let minutes = (newest.taken_at_ms.saturating_sub(oldest.taken_at_ms)) as f64 / 60_000.0;
        if minutes <= 0.0 {
            return BurnRate::unknown();
        }

        let tokens_per_minute =
            (newest.hourly_tokens_used as f64 - oldest.hourly_tokens_used as f64) / minutes;
        let cost_per_minute = (newest.hourly_cost_used - oldest.hourly_cost_used) / minutes;

        let mut time_to_limit = TIME_TO_LIMIT_CAP_MINUTES;
        if self.max_tokens_per_hour > 0 && tokens_per_minute > 0.0 {
            let remaining =
                self.max_tokens_per_hour as f64 - newest.hourly_tokens_used as f64;
            time_to_limit = time_to_limit.min((remaining / tokens_per_minute).max(0.0));
        }
        if self.max_cost_per_hour > 0.0 && cost_per_minute > 0.0 {
            let remaining = self.max_cost_per_hour - newest.hourly_cost_used;
            time_to_limit = time_to_limit.min((remaining / cost_per_minute).max(0.0));
        }

        let confidence = (recent.len() as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0);
        BurnRate {
            tokens_per_minute,
            cost_per_minute,
            time_to_limit_minutes: time_to_limit,
            confidence,
            level: self.config.thresholds.classify(time_to_limit),
            sample_count: recent.len(),
        }
    }

    fn maybe_alert(&self, inner: &mut MonitorInner, burn: &BurnRate, now_ms: u64) {
        let interval = ALERT_REPEAT_INTERVAL.as_millis() as u64;
        if burn.confidence <= MIN_ALERT_CONFIDENCE || burn.level == AlertLevel::Green {
            // Let a calm spell age out so the next escalation fires.
            if burn.level == AlertLevel::Green
                && inner
                    .last_alert_ms
                    .is_none_or(|t| now_ms.saturating_sub(t) >= interval)
            {
                inner.last_alert_level = AlertLevel::Green;
            }
            return;
        }

        let within_window = inner
            .last_alert_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < interval);
        // Monotone escalation: within the window only a strictly higher
        // level gets through.
        if within_window && burn.level <= inner.last_alert_level {
            return;
        }

        inner.last_alert_level = burn.level;
        inner.last_alert_ms = Some(now_ms);

        let message = format!(
            "quota {}: ~{:.0} min to limit at {:.0} tokens/min (confidence {:.1})",
            burn.level, burn.time_to_limit_minutes, burn.tokens_per_minute, burn.confidence
        );
        match burn.level {
            AlertLevel::Yellow => tracing::warn!(%message, "quota alert"),
            AlertLevel::Orange => tracing::error!(%message, "quota alert"),
            AlertLevel::Red => tracing::error!(%message, "quota alert: exhaustion imminent"),
            AlertLevel::Green => {}
        }

        let event = AgentEvent::new(AgentEventKind::QuotaAlert, message, now_ms)
            .severity(burn.level.severity());
        if let Err(e) = self.db.append_agent_event(&event) {
            tracing::warn!(error = %e, "failed to append quota alert event");
        }

        if burn.level == AlertLevel::Red && self.config.auto_create_crisis_issue {
            self.create_crisis_issue(burn, now_ms);
        }
    }

    /// File the P0 crisis issue unless one is already open.
    fn create_crisis_issue(&self, burn: &BurnRate, now_ms: u64) {
        match self.db.any_open_issue_with_label(label::QUOTA_CRISIS) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "crisis issue lookup failed");
                return;
            }
        }

        let description = format!(
            "Predicted quota exhaustion in {:.0} minutes.\n\n\
             Burn rate: {:.0} tokens/min (${:.4}/min)\n\
             Confidence: {:.1} ({} samples)\n\
             Hourly limits: {} tokens, ${:.2}\n\n\
             Recommended: pause non-critical executors, raise the hourly \
             budget, or wait for the window to reset.",
            burn.time_to_limit_minutes,
            burn.tokens_per_minute,
            burn.cost_per_minute,
            burn.confidence,
            burn.sample_count,
            self.max_tokens_per_hour,
            self.max_cost_per_hour,
        );
        let new = NewIssue::new(IssueType::Task, "quota crisis: predicted exhaustion")
            .description(description)
            .acceptance_criteria("Burn rate back under the RED threshold for a full window")
            .priority(0);

        let result = self
            .db
            .create_issue(&new, now_ms)
            .and_then(|()| self.db.add_label(&new.id, label::QUOTA_CRISIS))
            .and_then(|()| self.db.add_label(&new.id, label::NO_AUTO_CLAIM));
        match result {
            Ok(()) => tracing::error!(issue = %new.id, "created quota crisis issue"),
            Err(e) => tracing::warn!(error = %e, "failed to create quota crisis issue"),
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
