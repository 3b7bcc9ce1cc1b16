//! Keyed record store abstraction consumed by the Orchestrator and Worker
//! reactors (spec §4.1). The trait is the only concurrency primitive either
//! reactor relies on: every mutation is a conditional update whose predicate
//! names the exact pre-image the writer expects, and a rejected predicate is
//! always "someone else made progress, drop this event" rather than an
//! error (spec §5, §7).
//!
//! Preconditions and mutations are modeled as enums rather than the
//! string `set_expr`/`condition_expr` pair spec §4.1 describes, so the
//! trait stays object-safe (`Arc<dyn StateStore>`) instead of taking
//! generic closures. The semantics are identical; only the expression
//! language is typed.

mod memory;

pub use memory::InMemoryStateStore;

use async_trait::async_trait;
use flowmesh_types::{StoreItem, StoreKey, Task, TaskError, TaskStatus, WorkflowMeta, WorkflowStatus};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Outcome of a conditional update: either the predicate held and the
/// mutation was applied (returning the post-image), or it didn't
/// (spec §4.1, §5 — REJECTED is not an error).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome<T> {
    Applied(T),
    Rejected,
}

impl<T> UpdateOutcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(item) => Some(item),
            Self::Rejected => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Precondition evaluated against a task's pre-image before a mutation is
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPrecondition {
    /// `WHERE remainingDeps > 0` (step 1 of the dependency-decrement protocol).
    RemainingDepsPositive,
    /// `WHERE status = PENDING` (promotion, step 2).
    StatusIs(TaskStatus),
    /// `WHERE status = READY AND version = expectedVersion` (the Worker's claim).
    StatusIsWithVersion(TaskStatus, u64),
    /// Always true; used for the Worker's unconditional finalize writes,
    /// since the earlier claim already established exclusivity.
    Always,
}

/// Mutation applied to a task's post-image once its precondition holds.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskMutation {
    /// `SET remainingDeps = remainingDeps - 1`.
    DecrementRemainingDeps,
    /// `SET status = <to>, version = version + 1`.
    TransitionWithVersionBump(TaskStatus),
    /// `SET status = SUCCEEDED, result = <result>, durationMs = <duration_ms>`.
    Succeed { result: Value, duration_ms: u64 },
    /// `SET status = FAILED, error = <error>`.
    Fail(TaskError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record found for key {pk}/{sk}")]
    NotFound { pk: String, sk: String },
    #[error("transport error talking to the state store: {0}")]
    Transport(String),
}

/// Keyed record store with per-item conditional updates and an ordered
/// change-log of before/after images (spec §4.1).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Unconditional multi-write used only at seed (spec §4.2.1 step 3).
    async fn put_batch(&self, items: Vec<StoreItem>) -> Result<(), StoreError>;

    /// Returns every sibling of a partition (`WORKFLOW#<id>`), i.e. the
    /// entire workflow: its meta record plus every task record.
    async fn query(&self, pk: &str) -> Result<Vec<StoreItem>, StoreError>;

    /// Applies `mutation` to the task at `key` only if `precondition` holds
    /// on the pre-image.
    async fn conditional_update_task(
        &self,
        key: StoreKey,
        precondition: TaskPrecondition,
        mutation: TaskMutation,
    ) -> Result<UpdateOutcome<Task>, StoreError>;

    /// Recomputes `WorkflowMeta.status`, conditioned on `attribute_exists(pk)`
    /// (spec §4.2.4) — swallowed as `Rejected` if the meta record is gone.
    async fn conditional_update_meta_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<UpdateOutcome<WorkflowMeta>, StoreError>;

    /// Subscribes to the ordered, at-least-once, per-key-ordered change-log.
    /// Multiple subscribers may each hold an independent receiver.
    fn subscribe(&self) -> broadcast::Receiver<flowmesh_types::ChangeEvent>;
}
