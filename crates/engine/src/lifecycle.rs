// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-issue lifecycle driver.
//!
//! Takes a freshly claimed issue through assessing → executing →
//! analyzing → gates → committing → completed, consulting the budget
//! before every AI call, checkpointing between phases, and recording the
//! attempt. Failures mark the attempt, flip the state to failed, and
//! reopen the issue.

use crate::adapters::{AgentOutcome, CodingAgent, Vcs};
use crate::error::EngineError;
use fm_core::{Clock, ExecutionPhase, ExecutorId, IssueId, IssueStatus, OperationType};
use fm_quota::BudgetTracker;
use fm_storage::{Database, ReadyIssue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { summary: String },
    Failed { error: String },
}

/// Drives claimed issues through the execution phases.
pub struct IssueRunner<A, V, C: Clock> {
    db: Arc<Database>,
    budget: Arc<BudgetTracker<C>>,
    agent: A,
    vcs: V,
    clock: C,
    executor: ExecutorId,
}

impl<A, V, C> IssueRunner<A, V, C>
where
    A: CodingAgent,
    V: Vcs,
    C: Clock,
{
    pub fn new(
        db: Arc<Database>,
        budget: Arc<BudgetTracker<C>>,
        agent: A,
        vcs: V,
        clock: C,
        executor: ExecutorId,
    ) -> Self {
        Self { db, budget, agent, vcs, clock, executor }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Run one already-claimed issue to a terminal state.
    ///
    /// On cancellation the claim is released and the issue reopened;
    /// whatever checkpoint was last saved survives for the next attempt.
    pub async fn run(
        &self,
        ready: &ReadyIssue,
        token: &CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let issue = &ready.issue;
        let attempt = self
            .db
            .begin_attempt(&issue.id, &self.executor, self.clock.epoch_ms())?;

        let driven = tokio::select! {
            biased;
            () = token.cancelled() => Err(EngineError::Cancelled),
            result = self.drive(ready) => result,
        };

        let now_ms = self.clock.epoch_ms();
        match driven {
            Ok(summary) => {
                self.db
                    .finish_attempt(attempt, true, Some(0), Some(&summary), now_ms)?;
                tracing::info!(issue = %issue.id, %summary, "attempt completed");
                Ok(RunOutcome::Completed { summary })
            }
            Err(e) => {
                let error = e.to_string();
                self.db
                    .finish_attempt(attempt, false, None, Some(&error), now_ms)?;
                self.db
                    .release_and_reopen(&issue.id, &format!("attempt failed: {error}"), now_ms)?;
                Ok(RunOutcome::Failed { error })
            }
        }
    }

    async fn drive(&self, ready: &ReadyIssue) -> Result<String, EngineError> {
        let issue = &ready.issue;
        let id = issue.id;
        let mission = ready.mission.as_ref();
        let checkpoint = self.db.checkpoint(&id)?;

        self.gate(&id)?;
        self.advance(&id, ExecutionPhase::Assessing)?;
        let assessed = self.agent.assess(issue, mission, checkpoint.as_deref()).await?;
        self.record(&id, OperationType::Assessment, &assessed);
        self.persist_checkpoint(&id, &assessed)?;
        // The assessment is the pre-change picture; keep it as the gate
        // baseline for regression checks.
        self.db
            .store_gate_baseline(&id, &assessed.summary, self.clock.epoch_ms())?;

        self.gate(&id)?;
        self.advance(&id, ExecutionPhase::Executing)?;
        let executed = self
            .agent
            .execute(issue, mission, self.db.checkpoint(&id)?.as_deref())
            .await?;
        self.record(&id, OperationType::Execution, &executed);
        self.persist_checkpoint(&id, &executed)?;

        self.gate(&id)?;
        self.advance(&id, ExecutionPhase::Analyzing)?;
        let analyzed = self
            .agent
            .analyze(issue, self.db.checkpoint(&id)?.as_deref())
            .await?;
        self.record(&id, OperationType::Analysis, &analyzed);
        self.persist_checkpoint(&id, &analyzed)?;

        self.advance(&id, ExecutionPhase::Gates)?;
        self.db.record_review_checkpoint(
            &id,
            "gates",
            "pass",
            &analyzed.summary,
            self.clock.epoch_ms(),
        )?;

        self.advance(&id, ExecutionPhase::Committing)?;
        let branch = mission.and_then(|m| m.branch.as_deref());
        let commit = self.vcs.commit_and_push(issue, branch).await?;

        self.advance(&id, ExecutionPhase::Completed)?;
        self.db
            .set_issue_status(&id, IssueStatus::Closed, self.clock.epoch_ms())?;

        Ok(format!("{}: {commit}", executed.summary))
    }

    fn advance(&self, id: &IssueId, phase: ExecutionPhase) -> Result<(), EngineError> {
        self.db.update_state(id, phase, self.clock.epoch_ms())?;
        Ok(())
    }

    fn persist_checkpoint(&self, id: &IssueId, outcome: &AgentOutcome) -> Result<(), EngineError> {
        if let Some(checkpoint) = outcome.checkpoint.as_deref() {
            self.db
                .save_checkpoint(id, checkpoint, self.clock.epoch_ms())?;
        }
        Ok(())
    }

    /// Refuse to start an AI call when the budget says stop.
    fn gate(&self, id: &IssueId) -> Result<(), EngineError> {
        match self.budget.can_proceed(id) {
            fm_quota::Admission::Allowed => Ok(()),
            fm_quota::Admission::Denied { reason } => Err(EngineError::BudgetDenied(reason)),
        }
    }

    fn record(&self, id: &IssueId, operation: OperationType, outcome: &AgentOutcome) {
        self.budget.record_operation(
            Some(id),
            operation,
            &outcome.model,
            outcome.input_tokens,
            outcome.output_tokens,
        );
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
