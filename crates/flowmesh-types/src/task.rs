//! Task record and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store_item::StoreKey;
use crate::TaskId;

/// Lifecycle status of a single task.
///
/// Transitions are one-way: PENDING -> READY -> RUNNING -> (SUCCEEDED |
/// FAILED). CANCELED exists for forward compatibility with a sweeper (see
/// the liveness hole noted in the design notes) but nothing in this crate
/// currently produces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    /// True once a task can no longer transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// Error payload recorded on a FAILED transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskError {
    pub message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A single node in a workflow's DAG, persisted under sort key `TASK#<taskId>`.
///
/// Invariants (see spec §3):
/// - `remaining_deps >= 0` always.
/// - `status == Pending => remaining_deps > 0`; `status == Ready => remaining_deps == 0`.
/// - `version` strictly increases on every transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub workflow_id: String,
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Ordered, immutable after seed. Ordering carries no semantic weight
    /// beyond iteration (see design notes: list encoding is faithful to the
    /// original's comma-joined string, no significance implied).
    pub depends_on: Vec<TaskId>,
    pub dependents: Vec<TaskId>,
    pub remaining_deps: u32,
    pub version: u64,
    pub target_address: String,
    pub result: Option<Value>,
    pub error: Option<TaskError>,
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh PENDING/READY task at seed time. `remaining_deps` and
    /// the initial status are derived from `depends_on.len()` per spec §4.2.1.
    pub fn seeded(
        workflow_id: impl Into<String>,
        task_id: impl Into<TaskId>,
        depends_on: Vec<TaskId>,
        dependents: Vec<TaskId>,
        target_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let remaining_deps = depends_on.len() as u32;
        let status = if remaining_deps == 0 { TaskStatus::Ready } else { TaskStatus::Pending };
        Self {
            workflow_id: workflow_id.into(),
            task_id: task_id.into(),
            status,
            depends_on,
            dependents,
            remaining_deps,
            version: 0,
            target_address: target_address.into(),
            result: None,
            error: None,
            duration_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The store key this task is (or would be) persisted under.
    pub fn key_for_store(&self) -> StoreKey {
        StoreKey::task(&self.workflow_id, &self.task_id)
    }
}
