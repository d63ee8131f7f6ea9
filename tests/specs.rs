// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario specs.
//!
//! Cross-crate behavior an executor fleet relies on: dispatch visibility,
//! claim exclusivity, plan refinement races, crash recovery, and the
//! acceptance-criteria gate.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/acceptance.rs"]
mod acceptance;
#[path = "specs/contention.rs"]
mod contention;
#[path = "specs/dispatch.rs"]
mod dispatch;
#[path = "specs/plan_race.rs"]
mod plan_race;
#[path = "specs/recovery.rs"]
mod recovery;
