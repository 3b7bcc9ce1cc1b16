//! Submit -> list -> get round trip through the actual router, exercised
//! with `tower::ServiceExt::oneshot` rather than a bound TCP listener.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use flowmesh_api::{build_router, AppState};
use flowmesh_broadcast::{Broadcaster, ConnectionRegistry};
use flowmesh_engine::Orchestrator;
use flowmesh_store::InMemoryStateStore;
use flowmesh_types::{WorkflowSnapshot, WorkflowSummary};
use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use tower::ServiceExt;

fn build_state() -> Arc<AppState> {
    let store: Arc<dyn flowmesh_store::StateStore> = Arc::new(InMemoryStateStore::new());
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), 15_000));
    let registry = Arc::new(ConnectionRegistry::new());
    let broadcaster = Arc::new(Broadcaster::new(store.clone(), registry.clone()));
    let (dispatch, _receiver) = mpsc::unbounded_channel();

    Arc::new(AppState {
        store,
        orchestrator,
        broadcaster,
        registry,
        dispatch,
        known_workflows: RwLock::new(HashSet::new()),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn submit_then_list_then_get_round_trips() {
    let router = build_router(build_state());

    let submit = Request::builder()
        .method("POST")
        .uri("/workflows")
        .header("content-type", "application/json")
        .body(Body::from(json!({"workflowId": "wf-rest"}).to_string()))
        .unwrap();
    let response = router.clone().oneshot(submit).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let list = Request::builder().uri("/workflows").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(list).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summaries: Vec<WorkflowSummary> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].workflow_id, "wf-rest");

    let get = Request::builder().uri("/workflows/wf-rest").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot: WorkflowSnapshot = serde_json::from_value(body_json(response).await).unwrap();
    // Reference diamond graph (A -> B1,B2,B3 -> C): A starts READY, the
    // other three start PENDING.
    assert_eq!(snapshot.tasks.len(), 5);
}

#[tokio::test]
async fn get_unknown_workflow_is_404() {
    let router = build_router(build_state());
    let request = Request::builder().uri("/workflows/does-not-exist").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_rejects_blank_workflow_id() {
    let router = build_router(build_state());
    let request = Request::builder()
        .method("POST")
        .uri("/workflows")
        .header("content-type", "application/json")
        .body(Body::from(json!({"workflowId": "  "}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_rejects_missing_workflow_id() {
    let router = build_router(build_state());
    let request = Request::builder()
        .method("POST")
        .uri("/workflows")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
