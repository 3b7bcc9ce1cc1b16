//! Outbound invocation of a task's handler.
//!
//! A thin wrapper around a configured `reqwest::Client`, in the spirit of
//! `oatty-api`'s `HerokuClient`: one struct that owns the client and a base
//! set of headers, one method that does the actual call. Here there's no
//! base URL to validate since `target_address` is per-task and already
//! trusted (it comes from the seeded DAG, not user input at request time).

use std::time::Duration;

use async_trait::async_trait;
use flowmesh_types::{TaskId, WorkflowId};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("task handler at {target_address} timed out after {deadline_ms}ms")]
    Timeout { target_address: String, deadline_ms: u64 },
    #[error("task handler at {target_address} returned status {status}")]
    HandlerError { target_address: String, status: u16 },
    #[error("task handler at {target_address} is unreachable: {source}")]
    Transport { target_address: String, source: reqwest::Error },
    #[error("task handler at {target_address} returned a body that isn't valid JSON: {source}")]
    InvalidResponse { target_address: String, source: reqwest::Error },
}

/// Invokes a task's handler and returns its result payload (spec §4.3,
/// §4.4 step "execute").
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, target_address: &str, workflow_id: &WorkflowId, task_id: &TaskId, deadline_ms: u64) -> Result<Value, InvokerError>;
}

/// Default `TaskInvoker`: POSTs `{workflowId, taskId}` to `target_address`
/// and returns the parsed JSON body, bounded by `deadline_ms`.
#[derive(Debug, Clone)]
pub struct HttpTaskInvoker {
    http: Client,
}

impl HttpTaskInvoker {
    pub fn new() -> anyhow::Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http })
    }
}

impl Default for HttpTaskInvoker {
    fn default() -> Self {
        Self::new().expect("reqwest client with default settings should always build")
    }
}

#[async_trait]
impl TaskInvoker for HttpTaskInvoker {
    async fn invoke(&self, target_address: &str, workflow_id: &WorkflowId, task_id: &TaskId, deadline_ms: u64) -> Result<Value, InvokerError> {
        debug!(%target_address, %workflow_id, %task_id, deadline_ms, "invoking task handler");

        let body = serde_json::json!({
            "workflowId": workflow_id,
            "taskId": task_id,
        });

        // The deadline bounds the whole round trip, not just connect+send:
        // a handler that streams its response body slowly must time out
        // too (spec §4.3: "bounded by deadlineMs").
        let call = async {
            let response = self
                .http
                .post(target_address)
                .json(&body)
                .send()
                .await
                .map_err(|source| InvokerError::Transport { target_address: target_address.to_string(), source })?;

            let status = response.status();
            if !status.is_success() {
                return Err(InvokerError::HandlerError { target_address: target_address.to_string(), status: status.as_u16() });
            }

            response
                .json::<Value>()
                .await
                .map_err(|source| InvokerError::InvalidResponse { target_address: target_address.to_string(), source })
        };

        tokio::time::timeout(Duration::from_millis(deadline_ms), call)
            .await
            .map_err(|_| InvokerError::Timeout { target_address: target_address.to_string(), deadline_ms })?
    }
}
