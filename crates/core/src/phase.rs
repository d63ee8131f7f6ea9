// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-issue execution lifecycle phases and the watchdog backoff curve.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle phase of one claimed issue.
///
/// An issue moves through the phases in order while an executor works it;
/// `Failed` is reachable from every active phase. `Completed` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Claim released or never dispatched; eligible for (re-)claim
    Pending,
    /// Claimed by an executor, work not yet started
    Claimed,
    /// Agent is assessing the issue before execution
    Assessing,
    /// Agent is executing the change
    Executing,
    /// Agent is analyzing its own output
    Analyzing,
    /// Quality gates are running
    Gates,
    /// Changes are being committed and pushed
    Committing,
    /// Attempt finished successfully
    Completed,
    /// Attempt failed
    Failed,
}

crate::simple_display! {
    ExecutionPhase {
        Pending => "pending",
        Claimed => "claimed",
        Assessing => "assessing",
        Executing => "executing",
        Analyzing => "analyzing",
        Gates => "gates",
        Committing => "committing",
        Completed => "completed",
        Failed => "failed",
    }
}

crate::enum_from_str! {
    ExecutionPhase {
        "pending" => Pending,
        "claimed" => Claimed,
        "assessing" => Assessing,
        "executing" => Executing,
        "analyzing" => Analyzing,
        "gates" => Gates,
        "committing" => Committing,
        "completed" => Completed,
        "failed" => Failed,
    }
}

impl ExecutionPhase {
    /// Phases from which no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionPhase::Completed | ExecutionPhase::Failed)
    }

    /// Phases that represent an active claim held by an executor.
    ///
    /// A row in one of these phases must carry a non-null executor id and
    /// blocks competing claims.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Claimed
                | ExecutionPhase::Assessing
                | ExecutionPhase::Executing
                | ExecutionPhase::Analyzing
                | ExecutionPhase::Gates
                | ExecutionPhase::Committing
        )
    }

    /// Phases reachable from `self` in one step.
    pub fn valid_transitions(self) -> &'static [ExecutionPhase] {
        use ExecutionPhase::*;
        match self {
            Pending => &[Claimed],
            Claimed => &[Assessing, Failed],
            Assessing => &[Executing, Failed],
            Executing => &[Analyzing, Failed],
            Analyzing => &[Gates, Failed],
            Gates => &[Committing, Failed],
            Committing => &[Completed, Failed],
            Completed | Failed => &[],
        }
    }

    /// Whether `self → next` is an allowed transition.
    ///
    /// Same-phase is not a transition; callers that want idempotent
    /// re-initialization handle that case before consulting the table.
    pub fn can_transition_to(self, next: ExecutionPhase) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Minimum backoff before an issue with watchdog interventions is
/// offered for dispatch again.
///
/// Doubles per intervention starting at five minutes, capped at four hours.
/// Zero interventions require no backoff.
pub fn intervention_backoff(count: u32) -> Duration {
    const BASE: Duration = Duration::from_secs(5 * 60);
    const CAP: Duration = Duration::from_secs(4 * 60 * 60);
    if count == 0 {
        return Duration::ZERO;
    }
    // Saturate the shift well past the cap to avoid overflow on huge counts.
    let doublings = (count - 1).min(10);
    CAP.min(BASE * 2u32.pow(doublings))
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
