//! WebSocket surface (spec §6.2): `$connect` registers an optional
//! per-workflow filter, `$disconnect` deregisters. Frames are server to
//! client only.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use flowmesh_broadcast::{ConnectionSink, SendError};
use flowmesh_types::WorkflowUpdateMessage;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "workflowId")]
    workflow_id: Option<String>,
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>, Query(query): Query<WsQuery>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.workflow_id))
}

struct AxumConnectionSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl ConnectionSink for AxumConnectionSink {
    async fn send(&self, message: &WorkflowUpdateMessage) -> Result<(), SendError> {
        let text = serde_json::to_string(message).map_err(|err| SendError::Transient(err.to_string()))?;
        let mut sender = self.sender.lock().await;
        sender.send(Message::Text(text.into())).await.map_err(|_| SendError::Gone)
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, workflow_filter: Option<String>) {
    let (sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let sink = Arc::new(AxumConnectionSink { sender: Mutex::new(sender) });

    state.registry.add(connection_id, workflow_filter, sink).await;
    debug!(%connection_id, "websocket connected");

    // Server -> client only: drain incoming frames purely to detect close.
    while let Some(Ok(_)) = receiver.next().await {}

    state.registry.remove(&connection_id).await;
    debug!(%connection_id, "websocket disconnected");
}
