// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared setup for scenario specs.

use fm_core::{Clock, ExecutorId, ExecutorInstance, FakeClock, IssueId, IssueType, NewIssue};
use fm_storage::Database;
use std::sync::Arc;

pub struct Fleet {
    pub _dir: tempfile::TempDir,
    pub db: Arc<Database>,
    pub clock: FakeClock,
}

impl Fleet {
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(Database::open(dir.path()).unwrap());
        Self { _dir: dir, db, clock: FakeClock::new() }
    }

    pub fn executor(&self, id: &str) -> ExecutorId {
        let instance = ExecutorInstance::builder()
            .id(id)
            .started_at_ms(self.clock.epoch_ms())
            .last_heartbeat_ms(self.clock.epoch_ms())
            .build();
        self.db.register_executor(&instance).unwrap();
        instance.id
    }

    pub fn task(&self, id: &str, priority: i32) -> IssueId {
        let new = NewIssue::new(IssueType::Task, format!("task {id}"))
            .id(id)
            .acceptance_criteria("verified by the specs")
            .priority(priority);
        self.db.create_issue(&new, self.clock.epoch_ms()).unwrap();
        new.id
    }
}
