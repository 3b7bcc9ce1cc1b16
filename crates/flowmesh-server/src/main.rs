//! Binary entry point: wires the in-memory state store, the HTTP task
//! invoker, the Orchestrator/Worker reactors, the WebSocket broadcaster and
//! the REST/WebSocket API into one running process.

use std::sync::Arc;

use anyhow::{Context, Result};
use flowmesh_api::AppState;
use flowmesh_broadcast::{Broadcaster, ConnectionRegistry};
use flowmesh_engine::{Orchestrator, Worker};
use flowmesh_invoker::HttpTaskInvoker;
use flowmesh_store::{InMemoryStateStore, StateStore};
use flowmesh_types::TaskExecutionRequest;
use flowmesh_util::FlowmeshConfig;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Number of Worker executions allowed to run concurrently. The spec
/// places no bound here (§4.3); a fixed pool keeps a runaway fan-out from
/// opening unbounded outbound connections.
const WORKER_POOL_SIZE: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let config = FlowmeshConfig::from_env().context("loading configuration")?;
    flowmesh_util::init_tracing(&config.log_filter);

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let invoker: Arc<dyn flowmesh_invoker::TaskInvoker> = Arc::new(HttpTaskInvoker::new().context("building HTTP task invoker")?);
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), config.default_deadline_ms));
    let worker = Arc::new(Worker::new(store.clone(), invoker));
    let registry = Arc::new(ConnectionRegistry::new());
    let broadcaster = Arc::new(Broadcaster::new(store.clone(), registry.clone()));

    let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel::<TaskExecutionRequest>();

    let state = Arc::new(AppState {
        store: store.clone(),
        orchestrator: orchestrator.clone(),
        broadcaster: broadcaster.clone(),
        registry,
        dispatch: dispatch_tx.clone(),
        known_workflows: RwLock::new(Default::default()),
    });

    let shutdown = CancellationToken::new();

    let dispatch_handle = tokio::spawn(run_dispatch_loop(worker, dispatch_rx, shutdown.child_token()));
    let reactor_handle = tokio::spawn(run_change_log_loop(store, orchestrator, broadcaster, dispatch_tx, shutdown.child_token()));

    let router = flowmesh_api::build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "flowmesh-server listening");

    let server_shutdown = shutdown.child_token();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            server_shutdown.cancel();
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    let _ = dispatch_handle.await;
    let _ = reactor_handle.await;
    Ok(())
}

/// Drains the dispatch channel, running up to `WORKER_POOL_SIZE`
/// `Worker::run` calls concurrently (spec §4.3).
async fn run_dispatch_loop(worker: Arc<Worker>, mut receiver: mpsc::UnboundedReceiver<TaskExecutionRequest>, shutdown: CancellationToken) {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(WORKER_POOL_SIZE));
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = receiver.recv() => request,
        };
        let Some(request) = request else { break };

        let worker = worker.clone();
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = worker.run(request).await {
                error!(error = %err, "worker run failed");
            }
        });
    }
}

/// Subscribes to the state store's change-log and drives the Orchestrator's
/// react loop, feeding newly-promoted tasks back into the dispatch channel
/// and broadcasting every touched workflow (spec §4.2.2, §4.4).
async fn run_change_log_loop(
    store: Arc<dyn StateStore>,
    orchestrator: Arc<Orchestrator>,
    broadcaster: Arc<Broadcaster>,
    dispatch: mpsc::UnboundedSender<TaskExecutionRequest>,
    shutdown: CancellationToken,
) {
    let mut receiver = store.subscribe();
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = receiver.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "change-log consumer lagged, events were dropped");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        let outcome = match orchestrator.react(vec![event]).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "orchestrator react failed");
                continue;
            }
        };

        for request in outcome.requests {
            if dispatch.send(request).is_err() {
                error!("dispatch channel closed, promoted task request dropped");
            }
        }

        for workflow_id in &outcome.touched_workflows {
            if let Err(err) = broadcaster.broadcast(workflow_id).await {
                error!(%workflow_id, error = %err, "broadcast failed");
            }
        }
    }
}
