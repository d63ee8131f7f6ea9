// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor identity: registration, heartbeats, stale sweeps, shutdown.

use crate::error::EngineError;
use fm_core::{Clock, ExecutorId, ExecutorInstance, ExecutorStatus};
use fm_storage::Database;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Executor process configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Stable id for clean restarts; `None` generates a fresh one.
    pub instance_id: Option<ExecutorId>,
    pub hostname: String,
    pub version: String,
    /// Must be comfortably faster than `stale_threshold`.
    pub heartbeat_interval: Duration,
    /// Heartbeats older than this mark the executor crashed.
    pub stale_threshold: Duration,
    /// How often this process sweeps for dead peers.
    pub sweep_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            heartbeat_interval: Duration::from_secs(60),
            stale_threshold: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(2 * 60),
        }
    }
}

/// A registered executor process.
pub struct ExecutorHandle<C: Clock> {
    id: ExecutorId,
    db: Arc<Database>,
    clock: C,
    config: ExecutorConfig,
}

impl<C: Clock> ExecutorHandle<C> {
    /// Register this process in the executor registry (upsert) and return
    /// the handle driving its liveness loops.
    pub fn register(db: Arc<Database>, config: ExecutorConfig, clock: C) -> Result<Self, EngineError> {
        let id = config.instance_id.unwrap_or_default();
        let now_ms = clock.epoch_ms();
        db.register_executor(&ExecutorInstance {
            id,
            hostname: config.hostname.clone(),
            pid: std::process::id(),
            version: config.version.clone(),
            started_at_ms: now_ms,
            last_heartbeat_ms: now_ms,
            status: ExecutorStatus::Running,
        })?;
        Ok(Self { id, db, clock, config })
    }

    pub fn id(&self) -> ExecutorId {
        self.id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Refresh the heartbeat once. Re-registers when the registry row is
    /// gone (a peer may have pruned it).
    pub fn beat(&self) -> Result<(), EngineError> {
        let now_ms = self.clock.epoch_ms();
        match self.db.heartbeat(&self.id, now_ms) {
            Ok(()) => Ok(()),
            Err(fm_storage::StoreError::ExecutorNotFound { .. }) => {
                tracing::warn!(executor = %self.id, "registry row missing, re-registering");
                self.db.register_executor(&ExecutorInstance {
                    id: self.id,
                    hostname: self.config.hostname.clone(),
                    pid: std::process::id(),
                    version: self.config.version.clone(),
                    started_at_ms: now_ms,
                    last_heartbeat_ms: now_ms,
                    status: ExecutorStatus::Running,
                })?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Heartbeat until cancelled. Heartbeat failures are logged, not
    /// fatal; the next tick retries.
    pub async fn heartbeat_loop(&self, token: CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.config.heartbeat_interval) => {
                    if let Err(e) = self.beat() {
                        tracing::warn!(executor = %self.id, error = %e, "heartbeat failed");
                    }
                }
            }
        }
    }

    /// Sweep for crashed peers until cancelled. Each pass releases claims
    /// owned by executors whose heartbeat went stale.
    pub async fn sweep_loop(&self, token: CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.config.sweep_interval) => {
                    match self.db.cleanup_stale(self.config.stale_threshold, self.clock.epoch_ms()) {
                        Ok(outcome) if !outcome.is_empty() => {
                            tracing::info!(
                                released = outcome.released_issues.len(),
                                crashed = outcome.crashed_executors.len(),
                                "sweep released stale claims"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "stale sweep failed"),
                    }
                }
            }
        }
    }

    /// Run one sweep immediately.
    pub fn sweep_once(&self) -> Result<fm_storage::SweepOutcome, EngineError> {
        Ok(self
            .db
            .cleanup_stale(self.config.stale_threshold, self.clock.epoch_ms())?)
    }

    /// Graceful exit: mark this executor stopped.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.db.mark_executor_stopped(&self.id, self.clock.epoch_ms())?;
        tracing::info!(executor = %self.id, "executor stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
