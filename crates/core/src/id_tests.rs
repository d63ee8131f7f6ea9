// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::ExecutorId;
use crate::issue::IssueId;

#[test]
fn idbuf_round_trips() {
    let buf = IdBuf::new("vc-1a2b");
    assert_eq!(buf.as_str(), "vc-1a2b");
    assert!(!buf.is_empty());
    assert!(IdBuf::empty().is_empty());
}

#[test]
fn generated_ids_carry_prefix_and_fit() {
    let id = ExecutorId::new();
    assert!(id.as_str().starts_with("exe-"));
    assert!(id.as_str().len() <= ID_MAX_LEN);
    assert_eq!(id.suffix().len(), 19);
}

#[test]
fn issue_id_accepts_tracker_strings() {
    let id = IssueId::from_string("vc-1a2b");
    assert_eq!(id.as_str(), "vc-1a2b");
    assert_eq!(id.suffix(), "1a2b");
}

#[test]
fn ids_are_distinct() {
    assert_ne!(ExecutorId::new(), ExecutorId::new());
}

#[test]
fn id_serde_is_transparent() {
    let id = IssueId::from_string("vc-77");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"vc-77\"");
    let parsed: IssueId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn short_truncates() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}
