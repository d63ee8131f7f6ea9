// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn running_instance_goes_stale_past_threshold() {
    let inst = ExecutorInstance::builder().last_heartbeat_ms(1_000_000).build();

    let threshold = Duration::from_secs(300);
    assert!(!inst.is_stale(1_000_000 + 299_000, threshold));
    assert!(!inst.is_stale(1_000_000 + 300_000, threshold));
    assert!(inst.is_stale(1_000_000 + 300_001, threshold));
}

#[test]
fn stopped_instance_is_never_stale() {
    let inst = ExecutorInstance::builder()
        .status(ExecutorStatus::Stopped)
        .last_heartbeat_ms(0)
        .build();
    assert!(!inst.is_stale(u64::MAX, Duration::from_secs(1)));
}

#[test]
fn heartbeat_in_the_future_is_not_stale() {
    // Clock skew between processes must not mark fresh executors crashed
    let inst = ExecutorInstance::builder().last_heartbeat_ms(2_000_000).build();
    assert!(!inst.is_stale(1_000_000, Duration::from_secs(1)));
}
