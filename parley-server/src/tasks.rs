//! Task records with a counter-assigned identifier.
//!
//! Ids are handed out from a counter that only moves forward, including
//! across restarts: the counter is part of the snapshot, and a restored
//! store never issues an id at or below one it already holds.

use std::collections::HashMap;

use parley_proto::task::{Task, TaskId, TaskStatus};
use tokio::sync::RwLock;

use crate::error::ServiceError;

#[derive(Debug, Default)]
struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    next_id: u64,
}

/// Keyed task store plus the id counter.
///
/// The counter lives under the same lock as the map, so "assign id and
/// insert" is one step and concurrent creators never share an id.
#[derive(Debug, Default)]
pub struct TaskStore {
    inner: RwLock<TaskTable>,
}

impl TaskStore {
    /// Creates an empty store whose first task will get id `"0"`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from snapshot entries and the saved counter.
    #[must_use]
    pub fn restore(entries: Vec<(TaskId, Task)>, next_id: u64) -> Self {
        let floor = entries
            .iter()
            .filter_map(|(id, _)| id.as_str().parse::<u64>().ok())
            .max()
            .map_or(0, |max| max.saturating_add(1));
        Self {
            inner: RwLock::new(TaskTable {
                tasks: entries.into_iter().collect(),
                next_id: next_id.max(floor),
            }),
        }
    }

    /// Creates a `Pending` task with the next id.
    pub async fn create(&self, description: String, now: u64) -> Task {
        let mut inner = self.inner.write().await;
        let id = TaskId::from_counter(inner.next_id);
        inner.next_id += 1;
        let task = Task::new(id.clone(), description, now);
        inner.tasks.insert(id, task.clone());
        drop(inner);
        task
    }

    /// Returns the task with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if no such task exists.
    pub async fn get(&self, id: &TaskId) -> Result<Task, ServiceError> {
        let inner = self.inner.read().await;
        inner
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    /// Replaces a task's status and refreshes `updated`.
    ///
    /// Any status may follow any other, including itself. `updated` never
    /// moves backwards even if the clock does.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if no such task exists; nothing
    /// is modified in that case.
    pub async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        now: u64,
    ) -> Result<Task, ServiceError> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        task.status = status;
        task.updated = now.max(task.updated);
        Ok(task.clone())
    }

    /// Returns every task, ordered by creation time then id.
    pub async fn list_all(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<_> = inner.tasks.values().cloned().collect();
        drop(inner);
        tasks.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Returns the id the next created task will receive.
    pub async fn next_id(&self) -> u64 {
        self.inner.read().await.next_id
    }

    /// Captures every task plus the counter.
    pub async fn snapshot(&self) -> (Vec<(TaskId, Task)>, u64) {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .tasks
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let next_id = inner.next_id;
        drop(inner);
        entries.sort_by(|a, b| a.1.created.cmp(&b.1.created).then_with(|| a.0.cmp(&b.0)));
        (entries, next_id)
    }
}
