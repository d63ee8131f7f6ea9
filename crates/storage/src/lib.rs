// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-storage: SQLite persistence for the Foreman control plane.
//!
//! One database file per project under `<project>/.beads/`. All
//! cross-process coordination (claims, execution state, plans, executor
//! liveness) goes through this crate; in-process state stays in fm-quota.

mod agent_events;
mod claim;
mod db;
mod error;
mod exec_state;
mod executors;
mod gates;
mod issues;
mod missions;
mod plans;
mod quota_store;
mod ready;
mod schema;

#[cfg(test)]
pub(crate) mod test_util;

pub use claim::SweepOutcome;
pub use db::Database;
pub use error::StoreError;
pub use gates::ReviewCheckpoint;
pub use issues::Comment;
pub use ready::{ReadyFilter, ReadyIssue, ReadySort};

/// Crate-local result alias.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
