// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor process identity and liveness.

use serde::{Deserialize, Serialize};
use std::time::Duration;

crate::define_id! {
    /// Unique identifier for one executor process registration.
    ///
    /// Stable across clean restarts when the process persists and re-uses
    /// its id; registration is an upsert so a re-registration with the
    /// same id refreshes the heartbeat instead of forfeiting claims.
    pub struct ExecutorId("exe-");
}

/// Liveness status of an executor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
    Running,
    Stopped,
    Crashed,
}

crate::simple_display! {
    ExecutorStatus {
        Running => "running",
        Stopped => "stopped",
        Crashed => "crashed",
    }
}

crate::enum_from_str! {
    ExecutorStatus {
        "running" => Running,
        "stopped" => Stopped,
        "crashed" => Crashed,
    }
}

/// One registered executor process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInstance {
    pub id: ExecutorId,
    pub hostname: String,
    pub pid: u32,
    pub version: String,
    pub started_at_ms: u64,
    pub last_heartbeat_ms: u64,
    pub status: ExecutorStatus,
}

impl ExecutorInstance {
    /// A running instance whose heartbeat is older than `threshold` is
    /// presumed crashed and eligible for the sweep.
    pub fn is_stale(&self, now_ms: u64, threshold: Duration) -> bool {
        self.status == ExecutorStatus::Running
            && now_ms.saturating_sub(self.last_heartbeat_ms) > threshold.as_millis() as u64
    }
}

crate::builder! {
    pub struct ExecutorInstanceBuilder => ExecutorInstance {
        into {
            id: ExecutorId = "exe-test1",
            hostname: String = "testhost",
            version: String = "0.0.0-test",
        }
        set {
            pid: u32 = 4242,
            started_at_ms: u64 = 1_000_000,
            last_heartbeat_ms: u64 = 1_000_000,
            status: ExecutorStatus = ExecutorStatus::Running,
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
