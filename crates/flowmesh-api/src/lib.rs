//! REST management surface and WebSocket façade (spec §6): the thin
//! request/response boundary the spec treats as an external collaborator.
//! Everything here is glue over `flowmesh-engine` and `flowmesh-broadcast`.

pub mod rest;
pub mod ws;

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use flowmesh_broadcast::{Broadcaster, ConnectionRegistry};
use flowmesh_engine::Orchestrator;
use flowmesh_store::StateStore;
use flowmesh_types::WorkflowId;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};

/// Shared application state injected into every handler.
pub struct AppState {
    pub store: Arc<dyn StateStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub broadcaster: Arc<Broadcaster>,
    pub registry: Arc<ConnectionRegistry>,
    /// Dispatch channel for `TaskExecutionRequest`s produced by a seed or a
    /// react pass. A pool of Worker tasks, owned by the binary, drains this.
    pub dispatch: mpsc::UnboundedSender<flowmesh_types::TaskExecutionRequest>,
    /// Workflow ids seeded through this process. The in-memory store has no
    /// scan-all-partitions operation (spec §4.1 only specifies `query(pk)`),
    /// so `GET /workflows` needs this side index to know what to query.
    pub known_workflows: RwLock<HashSet<WorkflowId>>,
}

/// Builds the full router: REST management surface, WebSocket upgrade
/// endpoint, and a permissive CORS layer (spec §6.1: `Access-Control-Allow-Origin: *`,
/// methods `GET,POST,OPTIONS`).
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST, Method::OPTIONS]).allow_headers(Any);

    Router::new()
        .route("/workflows", post(rest::submit_workflow).get(rest::list_workflows))
        .route("/workflows/{id}", get(rest::get_workflow))
        .route("/ws", get(ws::upgrade))
        .route("/health", get(rest::health))
        .layer(cors)
        .with_state(state)
}
