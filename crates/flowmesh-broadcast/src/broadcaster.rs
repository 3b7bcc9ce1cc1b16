//! Broadcaster: fans a workflow's current snapshot to every subscribed
//! WebSocket connection, reaping dead ones as it goes (spec §4.4).

use std::sync::Arc;

use chrono::Utc;
use flowmesh_store::{StateStore, StoreError};
use flowmesh_types::{StoreItem, WorkflowSnapshot, WorkflowUpdateMessage};
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::{ConnectionRegistry, SendError};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("transport error querying the state store: {0}")]
    Store(#[from] StoreError),
    #[error("workflow {0} has no meta record to broadcast")]
    MissingMeta(String),
}

pub struct Broadcaster {
    store: Arc<dyn StateStore>,
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn StateStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Builds the current snapshot for `workflow_id` and sends it to every
    /// matching connection. Connections that report GONE are removed from
    /// the registry; other send failures are logged and skipped, matching
    /// spec §4.4 step 3 exactly.
    pub async fn broadcast(&self, workflow_id: &str) -> Result<(), BroadcastError> {
        let items = self.store.query(&flowmesh_types::store_item::partition_key(workflow_id)).await?;

        let meta = items.iter().find_map(StoreItem::as_meta).cloned().ok_or_else(|| BroadcastError::MissingMeta(workflow_id.to_string()))?;
        let tasks = items.into_iter().filter_map(StoreItem::into_task).collect();
        let snapshot = WorkflowSnapshot::new(meta, tasks);
        let message = WorkflowUpdateMessage::new(snapshot, Utc::now().timestamp_millis());

        let connections = self.registry.scan_matching(workflow_id).await;
        debug!(%workflow_id, connections = connections.len(), "broadcasting workflow update");

        // The only fan-out point in the engine that parallelizes internally
        // (spec §5): one send per connection, independent of the others.
        let results = join_all(connections.into_iter().map(|(connection_id, sink)| {
            let message = &message;
            async move { (connection_id, sink.send(message).await) }
        }))
        .await;

        for (connection_id, result) in results {
            match result {
                Ok(()) => {}
                Err(SendError::Gone) => {
                    self.registry.remove(&connection_id).await;
                }
                Err(SendError::Transient(reason)) => {
                    warn!(%connection_id, %reason, "transient send failure, leaving connection registered");
                }
            }
        }

        Ok(())
    }
}
