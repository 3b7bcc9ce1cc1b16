//! Orchestrator reactor: seeds workflows and reacts to change-log batches
//! to advance the DAG (spec §4.2).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use flowmesh_store::{StateStore, StoreError, TaskMutation, TaskPrecondition, UpdateOutcome};
use flowmesh_types::{
    ChangeEvent, ChangeEventKind, DagSpec, StoreItem, StoreKey, Task, TaskExecutionRequest, TaskId, TaskStatus, WorkflowId, WorkflowMeta, WorkflowStatus,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dag::{validate_graph, InvalidGraph};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] InvalidGraph),
    #[error("transport error talking to the state store: {0}")]
    Transport(#[from] StoreError),
}

/// Outcome of a single `react` invocation: the new requests to dispatch to
/// Workers, and the set of workflows whose state changed and should be
/// broadcast.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReactOutcome {
    pub requests: Vec<TaskExecutionRequest>,
    pub touched_workflows: HashSet<WorkflowId>,
}

pub struct Orchestrator {
    store: Arc<dyn StateStore>,
    default_deadline_ms: u64,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn StateStore>, default_deadline_ms: u64) -> Self {
        Self { store, default_deadline_ms }
    }

    /// Materializes a workflow's graph and returns the `TaskExecutionRequest`s
    /// for its roots (spec §4.2.1).
    pub async fn seed(&self, workflow_id: impl Into<WorkflowId>, dag: DagSpec) -> Result<Vec<TaskExecutionRequest>, OrchestratorError> {
        let workflow_id = workflow_id.into();
        let dependents = validate_graph(&dag)?;
        let now = Utc::now();

        let mut items = Vec::with_capacity(dag.nodes.len() + 1);
        let mut requests = Vec::new();
        let mut graph = HashMap::new();

        for task_id in dag.nodes.keys() {
            graph.insert(task_id.clone(), dependents.get(task_id).cloned().unwrap_or_default());
        }

        for (task_id, node) in dag.nodes {
            let task = Task::seeded(
                workflow_id.clone(),
                task_id.clone(),
                node.depends_on,
                dependents.get(&task_id).cloned().unwrap_or_default(),
                node.target_address.clone(),
                now,
            );
            if task.status == TaskStatus::Ready {
                requests.push(TaskExecutionRequest::new(workflow_id.clone(), task_id.clone(), node.target_address, 0, self.default_deadline_ms));
            }
            items.push(StoreItem::Task(task));
        }

        items.push(StoreItem::Meta(WorkflowMeta::seeded(workflow_id.clone(), graph, now)));

        // Not required to be atomic (spec §5, §9): partial visibility only
        // delays root dispatch, since roots start in READY regardless.
        self.store.put_batch(items).await?;

        info!(%workflow_id, roots = requests.len(), "seeded workflow");
        Ok(requests)
    }

    /// Consumes a batch of change-log events, advancing dependents of every
    /// just-succeeded task and recomputing workflow status for every
    /// touched workflow (spec §4.2.2).
    pub async fn react(&self, events: Vec<ChangeEvent>) -> Result<ReactOutcome, OrchestratorError> {
        let mut outcome = ReactOutcome::default();

        for event in events {
            let Some(new_task) = event.new_image.as_task() else { continue };
            let old_status = event.old_image.as_ref().and_then(|image| image.as_task()).map(|task| task.status);

            if old_status == Some(new_task.status) {
                // No status change on this task: nothing for react to do.
                continue;
            }

            outcome.touched_workflows.insert(new_task.workflow_id.clone());

            if event.kind == ChangeEventKind::Modify && new_task.status == TaskStatus::Succeeded && old_status != Some(TaskStatus::Succeeded) {
                for dependent in &new_task.dependents {
                    if let Some(request) = self.decrement_and_maybe_promote(&new_task.workflow_id, dependent).await? {
                        outcome.requests.push(request);
                    }
                }
            }
        }

        for workflow_id in &outcome.touched_workflows {
            self.recompute_workflow_status(workflow_id).await?;
        }

        Ok(outcome)
    }

    /// The dependency-decrement protocol (spec §4.2.3): decrement
    /// `remainingDeps`, and if it reaches zero, promote PENDING -> READY and
    /// emit the child's `TaskExecutionRequest`.
    async fn decrement_and_maybe_promote(&self, workflow_id: &str, dependent: &TaskId) -> Result<Option<TaskExecutionRequest>, OrchestratorError> {
        let key = StoreKey::task(workflow_id, dependent);

        let decremented = self
            .store
            .conditional_update_task(key.clone(), TaskPrecondition::RemainingDepsPositive, TaskMutation::DecrementRemainingDeps)
            .await?;

        let Some(decremented_task) = decremented.applied() else {
            // Already decremented by a redelivered event, or the dependent
            // was already READY. Not an error (spec §4.2.3 edge case).
            debug!(%workflow_id, task_id = %dependent, "decrement rejected, dropping redelivered event");
            return Ok(None);
        };

        if decremented_task.remaining_deps != 0 {
            return Ok(None);
        }

        let promoted = self
            .store
            .conditional_update_task(key, TaskPrecondition::StatusIs(TaskStatus::Pending), TaskMutation::TransitionWithVersionBump(TaskStatus::Ready))
            .await?;

        let Some(promoted_task) = promoted.applied() else {
            // A concurrent Orchestrator instance already promoted this task.
            debug!(%workflow_id, task_id = %dependent, "promotion rejected, another instance already promoted");
            return Ok(None);
        };

        Ok(Some(TaskExecutionRequest::new(
            promoted_task.workflow_id.clone(),
            promoted_task.task_id.clone(),
            promoted_task.target_address.clone(),
            promoted_task.version,
            self.default_deadline_ms,
        )))
    }

    /// Recomputes `WorkflowMeta.status` from the current task statuses and
    /// writes it, swallowing a rejection if the meta record is gone (spec
    /// §4.2.4).
    async fn recompute_workflow_status(&self, workflow_id: &str) -> Result<(), OrchestratorError> {
        let items = self.store.query(&flowmesh_types::store_item::partition_key(workflow_id)).await?;
        let statuses: Vec<TaskStatus> = items.iter().filter_map(StoreItem::as_task).map(|task| task.status).collect();

        let Some(status) = WorkflowStatus::recompute(statuses.iter()) else {
            return Ok(());
        };

        match self.store.conditional_update_meta_status(workflow_id, status).await? {
            UpdateOutcome::Applied(_) => {}
            UpdateOutcome::Rejected => {
                warn!(%workflow_id, "meta status recompute rejected, meta record missing");
            }
        }

        Ok(())
    }
}
