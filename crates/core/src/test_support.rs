// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers and proptest strategies shared with downstream crates.

pub mod strategies {
    use crate::phase::ExecutionPhase;
    use proptest::prelude::*;

    pub fn arb_phase() -> impl Strategy<Value = ExecutionPhase> {
        prop_oneof![
            Just(ExecutionPhase::Pending),
            Just(ExecutionPhase::Claimed),
            Just(ExecutionPhase::Assessing),
            Just(ExecutionPhase::Executing),
            Just(ExecutionPhase::Analyzing),
            Just(ExecutionPhase::Gates),
            Just(ExecutionPhase::Committing),
            Just(ExecutionPhase::Completed),
            Just(ExecutionPhase::Failed),
        ]
    }

    pub fn arb_active_phase() -> impl Strategy<Value = ExecutionPhase> {
        arb_phase().prop_filter("active phases only", |p| p.is_active())
    }
}
