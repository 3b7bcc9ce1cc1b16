//! Composite `(pk, sk)` keying scheme shared by every record in the State
//! Store, and the `StoreItem` enum that wraps either record kind.
//!
//! `pk = "WORKFLOW#" + workflowId`, `sk` is either `"META#WORKFLOW"` or
//! `"TASK#" + taskId` (spec §3, §6).

use serde::{Deserialize, Serialize};

use crate::{Task, WorkflowMeta};

/// Composite key identifying one record within the State Store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub pk: String,
    pub sk: String,
}

impl StoreKey {
    pub fn meta(workflow_id: &str) -> Self {
        Self { pk: partition_key(workflow_id), sk: META_SORT_KEY.to_string() }
    }

    pub fn task(workflow_id: &str, task_id: &str) -> Self {
        Self { pk: partition_key(workflow_id), sk: task_sort_key(task_id) }
    }

    /// Extracts the workflow id this key's partition belongs to.
    pub fn workflow_id(&self) -> &str {
        self.pk.strip_prefix(PARTITION_PREFIX).unwrap_or(&self.pk)
    }
}

const PARTITION_PREFIX: &str = "WORKFLOW#";
const META_SORT_KEY: &str = "META#WORKFLOW";
const TASK_SORT_KEY_PREFIX: &str = "TASK#";

pub fn partition_key(workflow_id: &str) -> String {
    format!("{PARTITION_PREFIX}{workflow_id}")
}

pub fn task_sort_key(task_id: &str) -> String {
    format!("{TASK_SORT_KEY_PREFIX}{task_id}")
}

/// One record as it lives in the State Store: either the singleton
/// workflow-level meta record or a single task record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum StoreItem {
    Meta(WorkflowMeta),
    Task(Task),
}

impl StoreItem {
    pub fn key(&self) -> StoreKey {
        match self {
            Self::Meta(meta) => StoreKey::meta(&meta.workflow_id),
            Self::Task(task) => StoreKey::task(&task.workflow_id, &task.task_id),
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&WorkflowMeta> {
        match self {
            Self::Meta(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn into_meta(self) -> Option<WorkflowMeta> {
        match self {
            Self::Meta(meta) => Some(meta),
            _ => None,
        }
    }
}
