//! Wire formats: the message the Orchestrator hands to the Worker, the
//! change-log event shape, and the broadcast envelope sent to WebSocket
//! clients.

use serde::{Deserialize, Serialize};

use crate::{StoreItem, TaskId, WorkflowId, WorkflowSnapshot};

/// Request handed from the Orchestrator to a Worker instance (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskExecutionRequest {
    pub workflow_id: WorkflowId,
    pub task_id: TaskId,
    pub target_address: String,
    pub expected_version: u64,
    pub deadline_ms: u64,
    pub correlation_id: String,
}

impl TaskExecutionRequest {
    pub fn new(workflow_id: impl Into<String>, task_id: impl Into<TaskId>, target_address: impl Into<String>, expected_version: u64, deadline_ms: u64) -> Self {
        let workflow_id = workflow_id.into();
        let correlation_id = workflow_id.clone();
        Self {
            workflow_id,
            task_id: task_id.into(),
            target_address: target_address.into(),
            expected_version,
            deadline_ms,
            correlation_id,
        }
    }
}

/// A single before/after image delivered by the State Store's change-log
/// (spec §4.1). Delivered at-least-once, ordered per key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeEventKind,
    pub old_image: Option<StoreItem>,
    pub new_image: StoreItem,
}

/// Mirrors DynamoDB stream event names closely enough to keep the
/// conceptual mapping to the original implementation obvious.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventKind {
    Insert,
    Modify,
}

/// Server -> client frame broadcast over WebSocket (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: WorkflowUpdateMessageType,
    pub workflow_id: WorkflowId,
    pub data: WorkflowSnapshot,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowUpdateMessageType {
    WorkflowUpdate,
}

impl WorkflowUpdateMessage {
    pub fn new(snapshot: WorkflowSnapshot, timestamp_ms: i64) -> Self {
        Self {
            message_type: WorkflowUpdateMessageType::WorkflowUpdate,
            workflow_id: snapshot.workflow_id.clone(),
            data: snapshot,
            timestamp: timestamp_ms,
        }
    }
}
