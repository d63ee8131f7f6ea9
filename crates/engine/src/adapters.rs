// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter seams for the coding-agent subprocess and the VCS driver.
//!
//! The engine drives these through traits so tests (and alternative
//! agent backends) plug in without touching the lifecycle code.

use async_trait::async_trait;
use fm_core::{Issue, MissionContext};
use thiserror::Error;

/// Errors from the coding-agent adapter.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent spawn failed: {0}")]
    Spawn(String),
    #[error("agent failed: {0}")]
    Failed(String),
}

/// Errors from the VCS adapter.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("push failed: {0}")]
    Push(String),
}

/// What one agent phase produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    pub summary: String,
    /// Opaque resume data to persist before the next phase.
    pub checkpoint: Option<String>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The coding-agent subprocess, one call per lifecycle phase.
#[async_trait]
pub trait CodingAgent: Send + Sync {
    /// Assess the issue before touching code.
    async fn assess(
        &self,
        issue: &Issue,
        mission: Option<&MissionContext>,
        checkpoint: Option<&str>,
    ) -> Result<AgentOutcome, AgentError>;

    /// Execute the change.
    async fn execute(
        &self,
        issue: &Issue,
        mission: Option<&MissionContext>,
        checkpoint: Option<&str>,
    ) -> Result<AgentOutcome, AgentError>;

    /// Analyze the produced change.
    async fn analyze(
        &self,
        issue: &Issue,
        checkpoint: Option<&str>,
    ) -> Result<AgentOutcome, AgentError>;
}

/// Commit/push driver invoked at the committing phase.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Commit the working tree and push. Returns the commit id.
    async fn commit_and_push(
        &self,
        issue: &Issue,
        branch: Option<&str>,
    ) -> Result<String, VcsError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use fakes::{FakeAgent, FakeVcs};

#[cfg(any(test, feature = "test-support"))]
mod fakes {
    use super::*;
    use parking_lot::Mutex;

    /// Scripted agent for tests. Phases succeed with canned outcomes
    /// unless a failure is armed.
    #[derive(Default)]
    pub struct FakeAgent {
        /// Phase name to fail at ("assess" | "execute" | "analyze").
        fail_at: Mutex<Option<String>>,
        /// Checkpoints observed at each phase entry.
        pub seen_checkpoints: Mutex<Vec<Option<String>>>,
        tokens_per_call: (u64, u64),
    }

    impl FakeAgent {
        pub fn new() -> Self {
            Self { tokens_per_call: (1_000, 200), ..Default::default() }
        }

        pub fn with_tokens(input: u64, output: u64) -> Self {
            Self { tokens_per_call: (input, output), ..Default::default() }
        }

        pub fn fail_at(self, phase: &str) -> Self {
            *self.fail_at.lock() = Some(phase.to_string());
            self
        }

        fn outcome(&self, phase: &str, checkpoint: Option<&str>) -> Result<AgentOutcome, AgentError> {
            self.seen_checkpoints.lock().push(checkpoint.map(str::to_string));
            if self.fail_at.lock().as_deref() == Some(phase) {
                return Err(AgentError::Failed(format!("scripted failure in {phase}")));
            }
            Ok(AgentOutcome {
                summary: format!("{phase} done"),
                checkpoint: Some(format!("after-{phase}")),
                model: "fake-small".to_string(),
                input_tokens: self.tokens_per_call.0,
                output_tokens: self.tokens_per_call.1,
            })
        }
    }

    #[async_trait]
    impl CodingAgent for FakeAgent {
        async fn assess(
            &self,
            _issue: &Issue,
            _mission: Option<&MissionContext>,
            checkpoint: Option<&str>,
        ) -> Result<AgentOutcome, AgentError> {
            self.outcome("assess", checkpoint)
        }

        async fn execute(
            &self,
            _issue: &Issue,
            _mission: Option<&MissionContext>,
            checkpoint: Option<&str>,
        ) -> Result<AgentOutcome, AgentError> {
            self.outcome("execute", checkpoint)
        }

        async fn analyze(
            &self,
            _issue: &Issue,
            checkpoint: Option<&str>,
        ) -> Result<AgentOutcome, AgentError> {
            self.outcome("analyze", checkpoint)
        }
    }

    /// Records commits; optionally fails.
    #[derive(Default)]
    pub struct FakeVcs {
        pub commits: Mutex<Vec<(String, Option<String>)>>,
        fail: Mutex<bool>,
    }

    impl FakeVcs {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let vcs = Self::default();
            *vcs.fail.lock() = true;
            vcs
        }
    }

    #[async_trait]
    impl Vcs for FakeVcs {
        async fn commit_and_push(
            &self,
            issue: &Issue,
            branch: Option<&str>,
        ) -> Result<String, VcsError> {
            if *self.fail.lock() {
                return Err(VcsError::Push(format!("remote rejected {}", issue.id)));
            }
            let commit = format!("commit-{}", issue.id.suffix());
            self.commits
                .lock()
                .push((issue.id.as_str().to_string(), branch.map(str::to_string)));
            Ok(commit)
        }
    }
}
