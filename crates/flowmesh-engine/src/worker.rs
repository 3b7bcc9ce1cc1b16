//! Worker reactor: claims a single task, executes it, and finalizes the
//! result (spec §4.3).

use std::sync::Arc;
use std::time::Instant;

use flowmesh_invoker::{InvokerError, TaskInvoker};
use flowmesh_store::{StateStore, StoreError, TaskMutation, TaskPrecondition};
use flowmesh_types::{StoreKey, TaskError, TaskExecutionRequest, TaskStatus};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("transport error talking to the state store: {0}")]
    Transport(#[from] StoreError),
}

/// Result of the claim step: either the Worker won the READY->RUNNING race
/// and should proceed to execute, or it lost and should stop (spec §4.3
/// step 1, scenario 3 "concurrent claim").
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed { version_after_claim: u64 },
    Stale,
}

pub struct Worker {
    store: Arc<dyn StateStore>,
    invoker: Arc<dyn TaskInvoker>,
}

impl Worker {
    pub fn new(store: Arc<dyn StateStore>, invoker: Arc<dyn TaskInvoker>) -> Self {
        Self { store, invoker }
    }

    /// Runs the full claim/execute/finalize protocol for one
    /// `TaskExecutionRequest`. Returns `Ok(ClaimOutcome::Stale)` rather than
    /// an error when the claim is rejected; that is a normal outcome, not a
    /// transport failure.
    pub async fn run(&self, request: TaskExecutionRequest) -> Result<ClaimOutcome, WorkerError> {
        let claim = self.claim(&request).await?;
        let ClaimOutcome::Claimed { .. } = claim else {
            info!(workflow_id = %request.workflow_id, task_id = %request.task_id, "claim rejected: stale or not ready");
            return Ok(ClaimOutcome::Stale);
        };

        let start = Instant::now();
        let outcome = self.invoker.invoke(&request.target_address, &request.workflow_id, &request.task_id, request.deadline_ms).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => self.finalize_success(&request, result, duration_ms).await?,
            Err(err) => self.finalize_failure(&request, err).await?,
        }

        Ok(claim)
    }

    /// `conditional_update(task, SET status=RUNNING, version=version+1,
    /// WHERE status=READY AND version=expectedVersion)`.
    ///
    /// Exposed publicly (not just via `run`) so callers can race two claims
    /// for the same task without triggering the invocation side effects of
    /// a full `run` — this is the seam scenario 3 ("concurrent claim")
    /// exercises.
    pub async fn claim(&self, request: &TaskExecutionRequest) -> Result<ClaimOutcome, WorkerError> {
        let key = StoreKey::task(&request.workflow_id, &request.task_id);
        let outcome = self
            .store
            .conditional_update_task(
                key,
                TaskPrecondition::StatusIsWithVersion(TaskStatus::Ready, request.expected_version),
                TaskMutation::TransitionWithVersionBump(TaskStatus::Running),
            )
            .await?;

        Ok(match outcome.applied() {
            Some(task) => ClaimOutcome::Claimed { version_after_claim: task.version },
            None => ClaimOutcome::Stale,
        })
    }

    async fn finalize_success(&self, request: &TaskExecutionRequest, result: serde_json::Value, duration_ms: u64) -> Result<(), WorkerError> {
        let key = StoreKey::task(&request.workflow_id, &request.task_id);
        self.store.conditional_update_task(key, TaskPrecondition::Always, TaskMutation::Succeed { result, duration_ms }).await?;
        info!(workflow_id = %request.workflow_id, task_id = %request.task_id, duration_ms, "task succeeded");
        Ok(())
    }

    async fn finalize_failure(&self, request: &TaskExecutionRequest, error: InvokerError) -> Result<(), WorkerError> {
        let key = StoreKey::task(&request.workflow_id, &request.task_id);
        let message = error.to_string();
        self.store.conditional_update_task(key, TaskPrecondition::Always, TaskMutation::Fail(TaskError::new(message.clone()))).await?;
        warn!(workflow_id = %request.workflow_id, task_id = %request.task_id, error = %message, "task failed");
        Ok(())
    }
}
