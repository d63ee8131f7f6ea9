// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labels with scheduler meaning.
//!
//! Labels are free-form strings; these four change dispatch behavior.

/// Suppresses automatic claiming of the labeled issue.
pub const NO_AUTO_CLAIM: &str = "no-auto-claim";

/// On a mission epic: children are withheld from dispatch until quality
/// gates are configured.
pub const NEEDS_QUALITY_GATES: &str = "needs-quality-gates";

/// Marks work discovered as a blocker; served from the priority blocker
/// queue ahead of normal ready work.
pub const DISCOVERED_BLOCKER: &str = "discovered:blocker";

/// Marks the open P0 issue created when quota exhaustion is predicted.
/// At most one open issue carries it at a time.
pub const QUOTA_CRISIS: &str = "quota-crisis";
