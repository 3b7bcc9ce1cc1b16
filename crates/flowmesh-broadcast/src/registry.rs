//! Connection Registry: keyed store of live WebSocket connections with an
//! optional per-workflow filter (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowmesh_types::{WorkflowId, WorkflowUpdateMessage};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("connection is gone")]
    Gone,
    #[error("transient send failure: {0}")]
    Transient(String),
}

/// The write half of one live connection. The broadcaster only ever calls
/// `send`; everything about framing and transport belongs to whoever
/// implements this (the REST/WebSocket façade, in practice an axum
/// `WebSocket` split sink).
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn send(&self, message: &WorkflowUpdateMessage) -> Result<(), SendError>;
}

struct Connection {
    workflow_filter: Option<WorkflowId>,
    sink: Arc<dyn ConnectionSink>,
}

/// Operations: `add`, `remove`, `scan`. Records are independent; no
/// ordering requirement (spec §4.5).
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self { connections: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Registers a connection, driven by the WebSocket `$connect` event.
    pub async fn add(&self, connection_id: ConnectionId, workflow_filter: Option<WorkflowId>, sink: Arc<dyn ConnectionSink>) {
        self.connections.write().await.insert(connection_id, Connection { workflow_filter, sink });
    }

    /// Deregisters a connection, driven by `$disconnect` or a GONE send
    /// result.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        self.connections.write().await.remove(connection_id);
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Snapshot of every live connection matching `workflow_id`: filter is
    /// either absent (subscribes-to-all) or equal to `workflow_id`.
    pub(crate) async fn scan_matching(&self, workflow_id: &str) -> Vec<(ConnectionId, Arc<dyn ConnectionSink>)> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.workflow_filter.as_deref().is_none_or(|filter| filter == workflow_id))
            .map(|(id, conn)| (*id, conn.sink.clone()))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
