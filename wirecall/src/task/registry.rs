//! The session's record of tasks in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CallHandle, Task, TaskId};

/// A concurrency-safe map from [`TaskId`] to the task in flight.
///
/// Cloning shares the underlying map. Every operation takes the registry's
/// lock for its full duration and never awaits while holding it.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<TaskId, Arc<Task>>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, id: TaskId) -> Option<Arc<Task>> {
        self.lock().get(&id).cloned()
    }

    /// Register `task` under its id.
    ///
    /// A task already registered under the same id is replaced and returned.
    /// It is not cancelled.
    pub fn add(&self, task: Arc<Task>) -> Option<Arc<Task>> {
        self.lock().insert(task.id(), task)
    }

    pub fn remove(&self, id: TaskId) -> Option<Arc<Task>> {
        self.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.lock().keys().copied().collect()
    }

    /// Cancel every registered task and clear the registry.
    ///
    /// Resolves once every transport call that was in flight has been
    /// aborted.
    pub async fn cancel_all(&self) {
        let tasks: Vec<Arc<Task>> = self.lock().drain().map(|(_, task)| task).collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(count = tasks.len(), "cancelling all tasks");

        let calls: Vec<_> = tasks
            .iter()
            .filter_map(|task| task.cancel_in_flight())
            .collect();
        futures::future::join_all(calls.into_iter().map(CallHandle::finished)).await;
    }

    /// Register `task` for as long as the returned guard lives.
    pub(crate) fn register(&self, task: Arc<Task>) -> Registration {
        let id = task.id();
        self.add(task.clone());
        Registration {
            registry: self.clone(),
            id,
            task,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Removes its task from the registry when dropped.
pub(crate) struct Registration {
    registry: TaskRegistry,
    id: TaskId,
    task: Arc<Task>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut tasks = self.registry.lock();
        // Only remove the entry if it still refers to this task.
        if tasks
            .get(&self.id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.task))
        {
            tasks.remove(&self.id);
        }
    }
}
