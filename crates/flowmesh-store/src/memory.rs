//! In-memory `StateStore` implementation.
//!
//! Built the way the teacher builds its in-process registries (an
//! `Arc<RwLock<HashMap<...>>>` guarded map — see `oatty-engine`'s provider
//! registry and `oatty-mcp`'s session/client registries) plus a
//! `tokio::sync::broadcast` channel standing in for the change-log.
//! `tokio::sync::broadcast` natively gives every subscriber an
//! at-least-once, per-sender-ordered stream, which is exactly what spec
//! §4.1 asks of the change-log.
//!
//! This implementation does not persist across process restarts; it's the
//! reference backing for the `StateStore` trait, the seam a production
//! deployment would replace with a real database (see SPEC_FULL.md §1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowmesh_types::{ChangeEvent, ChangeEventKind, StoreItem, StoreKey, Task, TaskStatus, WorkflowMeta, WorkflowStatus};
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use crate::{StateStore, StoreError, TaskMutation, TaskPrecondition, UpdateOutcome};

const CHANGE_LOG_CAPACITY: usize = 4096;

/// In-memory, single-process `StateStore`. Safe to share across reactor
/// tasks via an `Arc`.
pub struct InMemoryStateStore {
    items: Arc<RwLock<HashMap<StoreKey, StoreItem>>>,
    change_log: broadcast::Sender<ChangeEvent>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        let (change_log, _) = broadcast::channel(CHANGE_LOG_CAPACITY);
        Self { items: Arc::new(RwLock::new(HashMap::new())), change_log }
    }

    fn publish(&self, kind: ChangeEventKind, old_image: Option<StoreItem>, new_image: StoreItem) {
        let event = ChangeEvent { kind, old_image, new_image };
        // No subscribers is a valid state (e.g. before the Orchestrator's
        // consumption loop has started); a send error just means the event
        // is dropped, which is safe because nothing observed it yet.
        if self.change_log.send(event).is_err() {
            trace!("change-log has no subscribers, dropping event");
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put_batch(&self, items: Vec<StoreItem>) -> Result<(), StoreError> {
        let mut guard = self.items.write().await;
        for item in items {
            let key = item.key();
            guard.insert(key, item.clone());
            self.publish(ChangeEventKind::Insert, None, item);
        }
        Ok(())
    }

    async fn query(&self, pk: &str) -> Result<Vec<StoreItem>, StoreError> {
        let guard = self.items.read().await;
        Ok(guard.values().filter(|item| item.key().pk == pk).cloned().collect())
    }

    async fn conditional_update_task(
        &self,
        key: StoreKey,
        precondition: TaskPrecondition,
        mutation: TaskMutation,
    ) -> Result<UpdateOutcome<Task>, StoreError> {
        let mut guard = self.items.write().await;
        let Some(existing) = guard.get(&key) else {
            return Ok(UpdateOutcome::Rejected);
        };
        let Some(old_task) = existing.as_task().cloned() else {
            return Ok(UpdateOutcome::Rejected);
        };

        if !precondition_holds(&precondition, &old_task) {
            return Ok(UpdateOutcome::Rejected);
        }

        let mut new_task = old_task.clone();
        new_task.updated_at = Utc::now();
        match mutation {
            TaskMutation::DecrementRemainingDeps => {
                new_task.remaining_deps = new_task.remaining_deps.saturating_sub(1);
            }
            TaskMutation::TransitionWithVersionBump(status) => {
                new_task.status = status;
                new_task.version += 1;
            }
            TaskMutation::Succeed { result, duration_ms } => {
                new_task.status = TaskStatus::Succeeded;
                new_task.result = Some(result);
                new_task.duration_ms = Some(duration_ms);
            }
            TaskMutation::Fail(error) => {
                new_task.status = TaskStatus::Failed;
                new_task.error = Some(error);
            }
        }

        let new_item = StoreItem::Task(new_task.clone());
        guard.insert(key, new_item.clone());
        self.publish(ChangeEventKind::Modify, Some(StoreItem::Task(old_task)), new_item);

        Ok(UpdateOutcome::Applied(new_task))
    }

    async fn conditional_update_meta_status(&self, workflow_id: &str, status: WorkflowStatus) -> Result<UpdateOutcome<WorkflowMeta>, StoreError> {
        let key = StoreKey::meta(workflow_id);
        let mut guard = self.items.write().await;
        let Some(existing) = guard.get(&key) else {
            // attribute_exists(pk) fails: the META may have been removed by
            // an external actor (spec §4.2.4). Swallowed, not an error.
            return Ok(UpdateOutcome::Rejected);
        };
        let Some(old_meta) = existing.as_meta().cloned() else {
            return Ok(UpdateOutcome::Rejected);
        };

        let mut new_meta = old_meta.clone();
        new_meta.status = status;
        new_meta.updated_at = Utc::now();

        let new_item = StoreItem::Meta(new_meta.clone());
        guard.insert(key, new_item.clone());
        self.publish(ChangeEventKind::Modify, Some(StoreItem::Meta(old_meta)), new_item);

        Ok(UpdateOutcome::Applied(new_meta))
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.change_log.subscribe()
    }
}

fn precondition_holds(precondition: &TaskPrecondition, task: &Task) -> bool {
    match precondition {
        TaskPrecondition::RemainingDepsPositive => task.remaining_deps > 0,
        TaskPrecondition::StatusIs(expected) => task.status == *expected,
        TaskPrecondition::StatusIsWithVersion(expected_status, expected_version) => {
            task.status == *expected_status && task.version == *expected_version
        }
        TaskPrecondition::Always => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowmesh_types::{Task, TaskStatus};

    fn seeded_task(remaining_deps: u32, status: TaskStatus) -> Task {
        Task {
            workflow_id: "wf1".into(),
            task_id: "B1".into(),
            status,
            depends_on: vec!["A".into()],
            dependents: vec!["C".into()],
            remaining_deps,
            version: 0,
            target_address: "http://example.test/b1".into(),
            result: None,
            error: None,
            duration_ms: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn decrement_is_rejected_once_remaining_deps_hits_zero() {
        let store = InMemoryStateStore::new();
        let task = seeded_task(1, TaskStatus::Pending);
        let key = task.key_for_store();
        store.put_batch(vec![StoreItem::Task(task)]).await.unwrap();

        let first = store
            .conditional_update_task(key.clone(), TaskPrecondition::RemainingDepsPositive, TaskMutation::DecrementRemainingDeps)
            .await
            .unwrap();
        assert!(matches!(first, UpdateOutcome::Applied(ref t) if t.remaining_deps == 0));

        let second = store
            .conditional_update_task(key, TaskPrecondition::RemainingDepsPositive, TaskMutation::DecrementRemainingDeps)
            .await
            .unwrap();
        assert_eq!(second, UpdateOutcome::Rejected);
    }

    #[tokio::test]
    async fn promotion_is_single_shot() {
        let store = InMemoryStateStore::new();
        let task = seeded_task(0, TaskStatus::Pending);
        let key = task.key_for_store();
        store.put_batch(vec![StoreItem::Task(task)]).await.unwrap();

        let first = store
            .conditional_update_task(
                key.clone(),
                TaskPrecondition::StatusIs(TaskStatus::Pending),
                TaskMutation::TransitionWithVersionBump(TaskStatus::Ready),
            )
            .await
            .unwrap();
        assert!(matches!(first, UpdateOutcome::Applied(ref t) if t.status == TaskStatus::Ready && t.version == 1));

        let second = store
            .conditional_update_task(
                key,
                TaskPrecondition::StatusIs(TaskStatus::Pending),
                TaskMutation::TransitionWithVersionBump(TaskStatus::Ready),
            )
            .await
            .unwrap();
        assert_eq!(second, UpdateOutcome::Rejected);
    }

    #[tokio::test]
    async fn meta_recompute_swallows_missing_record() {
        let store = InMemoryStateStore::new();
        let outcome = store.conditional_update_meta_status("ghost", WorkflowStatus::Failed).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Rejected);
    }
}
