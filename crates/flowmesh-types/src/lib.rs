//! Shared data model for the flowmesh DAG execution engine.
//!
//! These types are deliberately store-agnostic: the same `Task`/`Workflow`
//! shapes are written by the Orchestrator and Worker reactors, read by the
//! REST façade, and carried over the WebSocket broadcast. Keeping them in
//! one crate means the wire format and the persisted format never drift.

pub mod dag;
pub mod store_item;
pub mod task;
pub mod wire;
pub mod workflow;

pub use dag::{DagSpec, NodeSpec};
pub use store_item::{StoreItem, StoreKey};
pub use task::{Task, TaskError, TaskStatus};
pub use wire::{ChangeEvent, ChangeEventKind, TaskExecutionRequest, WorkflowUpdateMessage};
pub use workflow::{WorkflowMeta, WorkflowSnapshot, WorkflowStatus, WorkflowSummary};

/// Identifier type for a single task within a workflow's graph.
///
/// A plain `String` alias rather than a newtype: the corpus (e.g. the
/// teacher's `oatty-types`) favors plain `String` ids for identifiers that
/// only ever flow through serde boundaries and hash-map keys.
pub type TaskId = String;

/// Identifier type for a workflow instance.
pub type WorkflowId = String;

/// Default deadline, in milliseconds, applied to a `TaskExecutionRequest`
/// when a seed omits one. Mirrors the `15000` literal hard-coded throughout
/// the original Python orchestrator/worker lambdas.
pub const DEFAULT_DEADLINE_MS: u64 = 15_000;
