//! The management surface (spec §6.1): submit, list, and fetch a workflow.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use flowmesh_types::{DagSpec, NodeSpec, StoreItem, TaskId, WorkflowId, WorkflowSnapshot, WorkflowSummary};
use serde::Deserialize;
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitWorkflowRequest {
    /// Missing entirely deserializes to an empty string rather than
    /// rejecting the body, so a request that omits the key falls through
    /// to the same 400 branch as a present-but-blank one.
    #[serde(default)]
    pub workflow_id: String,
    /// Per-task handler addresses. Optional: when `graph` is also omitted,
    /// the reference diamond DAG (`A -> {B1,B2,B3} -> C`, spec §4.2.1) is
    /// seeded, with addresses drawn from here or a local placeholder.
    #[serde(default)]
    pub lambdas: HashMap<TaskId, String>,
    /// Caller-supplied adjacency (`taskId -> dependsOn`). When present, this
    /// fully determines the graph; `lambdas` supplies each node's address.
    pub graph: Option<HashMap<TaskId, Vec<TaskId>>>,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn submit_workflow(State(state): State<Arc<AppState>>, Json(body): Json<SubmitWorkflowRequest>) -> impl IntoResponse {
    let workflow_id = body.workflow_id.trim().to_string();
    if workflow_id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "workflowId is required"}))).into_response();
    }

    let dag = build_dag_spec(&body.graph, &body.lambdas);

    match state.orchestrator.seed(workflow_id.clone(), dag).await {
        Ok(requests) => {
            state.known_workflows.write().await.insert(workflow_id.clone());
            for request in requests {
                if state.dispatch.send(request).is_err() {
                    error!(%workflow_id, "dispatch channel closed, root requests dropped");
                }
            }
            info!(%workflow_id, "workflow accepted");
            (StatusCode::ACCEPTED, Json(serde_json::json!({"ok": true, "workflowId": workflow_id}))).into_response()
        }
        Err(flowmesh_engine::OrchestratorError::InvalidGraph(err)) => {
            (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": err.to_string()}))).into_response()
        }
        Err(err) => {
            error!(%workflow_id, error = %err, "seed failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": "internal error"}))).into_response()
        }
    }
}

fn build_dag_spec(graph: &Option<HashMap<TaskId, Vec<TaskId>>>, lambdas: &HashMap<TaskId, String>) -> DagSpec {
    let address_for = |task_id: &str| lambdas.get(task_id).cloned().unwrap_or_else(|| format!("http://localhost:9000/handlers/{task_id}"));

    let Some(graph) = graph else {
        let targets = ["A", "B1", "B2", "B3", "C"].into_iter().map(|task_id| (task_id.to_string(), address_for(task_id))).collect();
        return DagSpec::diamond(targets);
    };

    let mut nodes = HashMap::with_capacity(graph.len());
    for (task_id, depends_on) in graph {
        let target_address = address_for(task_id);
        nodes.insert(task_id.clone(), NodeSpec { depends_on: depends_on.clone(), target_address });
    }
    DagSpec { nodes }
}

pub async fn list_workflows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workflow_ids: Vec<WorkflowId> = state.known_workflows.read().await.iter().cloned().collect();
    let mut summaries = Vec::with_capacity(workflow_ids.len());

    for workflow_id in workflow_ids {
        let pk = flowmesh_types::store_item::partition_key(&workflow_id);
        match state.store.query(&pk).await {
            Ok(items) => {
                if let Some(meta) = items.iter().find_map(StoreItem::as_meta) {
                    summaries.push(WorkflowSummary { workflow_id: meta.workflow_id.clone(), status: meta.status });
                }
            }
            Err(err) => error!(%workflow_id, error = %err, "failed to query workflow for listing"),
        }
    }

    (StatusCode::OK, Json(summaries)).into_response()
}

pub async fn get_workflow(State(state): State<Arc<AppState>>, Path(workflow_id): Path<String>) -> impl IntoResponse {
    let pk = flowmesh_types::store_item::partition_key(&workflow_id);
    let items = match state.store.query(&pk).await {
        Ok(items) => items,
        Err(err) => {
            error!(%workflow_id, error = %err, "failed to query workflow");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"error": "internal error"}))).into_response();
        }
    };

    let Some(meta) = items.iter().find_map(StoreItem::as_meta).cloned() else {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "workflow not found"}))).into_response();
    };

    let tasks = items.into_iter().filter_map(StoreItem::into_task).collect();
    let snapshot = WorkflowSnapshot::new(meta, tasks);
    (StatusCode::OK, Json(snapshot)).into_response()
}
