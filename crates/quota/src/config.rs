// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment-variable configuration.
//!
//! Every setting reads `FM_*` with a parse-or-default fallback; invalid
//! values log a warning and revert to the default rather than failing
//! startup.

use fm_core::AlertThresholds;
use std::path::PathBuf;
use std::time::Duration;

/// Common prefix for all configuration variables.
pub const ENV_PREFIX: &str = "FM_";

/// Budget tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetConfig {
    pub enabled: bool,
    /// 0 = unlimited.
    pub max_tokens_per_hour: u64,
    /// 0 = unlimited. Enforced by `can_proceed`, not `record_usage`.
    pub max_tokens_per_issue: u64,
    /// USD. 0.0 = unlimited.
    pub max_cost_per_hour: f64,
    /// Fraction of a limit at which WARNING starts, in (0, 1].
    pub alert_threshold: f64,
    /// Rolling-window reset interval.
    pub reset_interval: Duration,
    /// Budget state file; `None` disables persistence.
    pub persist_path: Option<PathBuf>,
    /// USD per million input tokens.
    pub input_cost_per_mtok: f64,
    /// USD per million output tokens.
    pub output_cost_per_mtok: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tokens_per_hour: 0,
            max_tokens_per_issue: 0,
            max_cost_per_hour: 0.0,
            alert_threshold: 0.8,
            reset_interval: Duration::from_secs(60 * 60),
            persist_path: None,
            input_cost_per_mtok: 3.0,
            output_cost_per_mtok: 15.0,
        }
    }
}

impl BudgetConfig {
    /// Load from `FM_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let alert_threshold = env_parse("FM_ALERT_THRESHOLD", defaults.alert_threshold);
        let alert_threshold = if alert_threshold > 0.0 && alert_threshold <= 1.0 {
            alert_threshold
        } else {
            tracing::warn!(
                value = alert_threshold,
                "FM_ALERT_THRESHOLD must be in (0, 1]; using default"
            );
            defaults.alert_threshold
        };
        Self {
            enabled: env_parse("FM_BUDGET_ENABLED", defaults.enabled),
            max_tokens_per_hour: env_parse("FM_MAX_TOKENS_PER_HOUR", defaults.max_tokens_per_hour),
            max_tokens_per_issue: env_parse(
                "FM_MAX_TOKENS_PER_ISSUE",
                defaults.max_tokens_per_issue,
            ),
            max_cost_per_hour: env_parse("FM_MAX_COST_PER_HOUR", defaults.max_cost_per_hour),
            alert_threshold,
            reset_interval: Duration::from_secs(
                60 * env_parse("FM_BUDGET_RESET_MINUTES", 60u64),
            ),
            persist_path: std::env::var("FM_BUDGET_STATE_PATH").ok().map(PathBuf::from),
            input_cost_per_mtok: env_parse("FM_INPUT_COST_PER_MTOK", defaults.input_cost_per_mtok),
            output_cost_per_mtok: env_parse(
                "FM_OUTPUT_COST_PER_MTOK",
                defaults.output_cost_per_mtok,
            ),
        }
    }

    /// The fraction of the hourly token limit used, when one is set.
    pub fn token_fraction(&self, used: u64) -> Option<f64> {
        (self.max_tokens_per_hour > 0)
            .then(|| used as f64 / self.max_tokens_per_hour as f64)
    }

    /// The fraction of the hourly cost limit used, when one is set.
    pub fn cost_fraction(&self, used: f64) -> Option<f64> {
        (self.max_cost_per_hour > 0.0).then(|| used / self.max_cost_per_hour)
    }
}

/// Quota monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaConfig {
    pub enabled: bool,
    /// Minimum gap between captured snapshots.
    pub snapshot_interval: Duration,
    /// Time-to-limit alert thresholds; invalid orderings revert to the
    /// defaults with a warning.
    pub thresholds: AlertThresholds,
    /// How long durable snapshots/operations are kept.
    pub retention: Duration,
    pub auto_create_crisis_issue: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_interval: Duration::from_secs(5 * 60),
            thresholds: AlertThresholds::default(),
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            auto_create_crisis_issue: true,
        }
    }
}

impl QuotaConfig {
    /// Load from `FM_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let yellow = env_parse("FM_QUOTA_YELLOW_MINUTES", defaults.thresholds.yellow_minutes);
        let orange = env_parse("FM_QUOTA_ORANGE_MINUTES", defaults.thresholds.orange_minutes);
        let red = env_parse("FM_QUOTA_RED_MINUTES", defaults.thresholds.red_minutes);
        let thresholds = match AlertThresholds::new(yellow, orange, red) {
            Some(t) => t,
            None => {
                tracing::warn!(
                    yellow,
                    orange,
                    red,
                    "quota thresholds must satisfy red < orange < yellow; using defaults"
                );
                defaults.thresholds
            }
        };
        Self {
            enabled: env_parse("FM_QUOTA_MONITOR_ENABLED", defaults.enabled),
            snapshot_interval: Duration::from_secs(
                60 * env_parse("FM_QUOTA_SNAPSHOT_MINUTES", 5u64),
            ),
            thresholds,
            retention: Duration::from_secs(
                24 * 60 * 60 * env_parse("FM_QUOTA_RETENTION_DAYS", 30u64),
            ),
            auto_create_crisis_issue: env_parse(
                "FM_QUOTA_AUTO_CRISIS",
                defaults.auto_create_crisis_issue,
            ),
        }
    }
}

/// Parse an env var, falling back to `default` (with a warning) when the
/// value is present but unparseable.
fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Err(_) => default,
        Ok(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "unparseable value; using default");
                default
            }
        },
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
