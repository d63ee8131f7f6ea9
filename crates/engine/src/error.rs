// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use thiserror::Error;

/// Errors from the executor runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Store(#[from] fm_storage::StoreError),
    #[error("agent error: {0}")]
    Agent(#[from] crate::adapters::AgentError),
    #[error("vcs error: {0}")]
    Vcs(#[from] crate::adapters::VcsError),
    #[error("budget refused the call: {0}")]
    BudgetDenied(String),
    #[error("cancelled")]
    Cancelled,
}
