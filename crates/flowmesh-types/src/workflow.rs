//! Workflow-level (meta) record and derived status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Task, TaskId, TaskStatus};

/// Lifecycle status of a workflow as a whole, a pure function of its tasks'
/// statuses (spec §4.2.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl WorkflowStatus {
    /// Table from spec §4.2.4: any FAILED task dominates, then all-SUCCEEDED,
    /// then any RUNNING/READY, otherwise PENDING.
    pub fn recompute<'a>(statuses: impl Iterator<Item = &'a TaskStatus>) -> Option<Self> {
        let mut any_failed = false;
        let mut any_running_or_ready = false;
        let mut all_succeeded = true;
        let mut saw_any = false;

        for status in statuses {
            saw_any = true;
            match status {
                TaskStatus::Failed => any_failed = true,
                TaskStatus::Running | TaskStatus::Ready => any_running_or_ready = true,
                _ => {}
            }
            if *status != TaskStatus::Succeeded {
                all_succeeded = false;
            }
        }

        if !saw_any {
            return None;
        }
        if any_failed {
            Some(Self::Failed)
        } else if all_succeeded {
            Some(Self::Succeeded)
        } else if any_running_or_ready {
            Some(Self::Running)
        } else {
            Some(Self::Pending)
        }
    }
}

/// Singleton `META#WORKFLOW` record per workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowMeta {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    /// Adjacency snapshot captured at seed time: `taskId -> dependents`.
    /// Supplements the distilled spec so `GET /workflows/{id}` can return a
    /// real `dag` field derived from the seeded graph instead of a
    /// hard-coded one (see SPEC_FULL.md §10).
    pub graph: HashMap<TaskId, Vec<TaskId>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMeta {
    pub fn seeded(workflow_id: impl Into<String>, graph: HashMap<TaskId, Vec<TaskId>>, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Pending,
            graph,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row shape returned by `GET /workflows` — just the identifying summary,
/// not the full task list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub status: WorkflowStatus,
}

/// Full snapshot returned by `GET /workflows/{id}` and carried in the
/// WebSocket broadcast payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSnapshot {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub tasks: Vec<Task>,
    pub dag: HashMap<TaskId, Vec<TaskId>>,
}

impl WorkflowSnapshot {
    pub fn new(meta: WorkflowMeta, mut tasks: Vec<Task>) -> Self {
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Self {
            workflow_id: meta.workflow_id,
            status: meta.status,
            tasks,
            dag: meta.graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_favors_failed_over_everything() {
        let statuses = [TaskStatus::Succeeded, TaskStatus::Failed, TaskStatus::Ready];
        assert_eq!(WorkflowStatus::recompute(statuses.iter()), Some(WorkflowStatus::Failed));
    }

    #[test]
    fn recompute_succeeded_requires_all_succeeded() {
        let statuses = [TaskStatus::Succeeded, TaskStatus::Succeeded];
        assert_eq!(WorkflowStatus::recompute(statuses.iter()), Some(WorkflowStatus::Succeeded));
    }

    #[test]
    fn recompute_running_when_any_ready_or_running() {
        let statuses = [TaskStatus::Pending, TaskStatus::Ready];
        assert_eq!(WorkflowStatus::recompute(statuses.iter()), Some(WorkflowStatus::Running));
    }

    #[test]
    fn recompute_pending_when_nothing_active() {
        let statuses = [TaskStatus::Pending, TaskStatus::Pending];
        assert_eq!(WorkflowStatus::recompute(statuses.iter()), Some(WorkflowStatus::Pending));
    }

    #[test]
    fn recompute_none_for_empty_workflow() {
        let statuses: [TaskStatus; 0] = [];
        assert_eq!(WorkflowStatus::recompute(statuses.iter()), None);
    }
}
