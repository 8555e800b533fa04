//! Active-task map owned by the coordinator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{TaskProgressBroadcaster, TaskProgressEvent, TaskSubscription};
use crate::config::CategoryPolicy;
use crate::error::TaskError;
use crate::task::{TaskId, TaskState, UploadTask};
use crate::validator::{ByteSource, FileMeta};

use super::runner::TaskRun;

struct TaskEntry {
    task: UploadTask,
    meta: FileMeta,
    source: ByteSource,
    policy: Arc<CategoryPolicy>,
    cancel: CancellationToken,
    subscribers: Vec<mpsc::UnboundedSender<TaskProgressEvent>>,
}

impl TaskEntry {
    fn run(&self) -> TaskRun {
        TaskRun {
            id: self.task.id.clone(),
            attempt: self.task.retry_count,
            meta: self.meta.clone(),
            source: self.source.clone(),
            policy: Arc::clone(&self.policy),
            cancel: self.cancel.clone(),
        }
    }

    /// Delivers events in order. Subscribers are dropped after a terminal
    /// event, which ends their streams.
    fn publish(&mut self, events: Vec<TaskProgressEvent>, broadcaster: &TaskProgressBroadcaster) {
        for event in events {
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            broadcaster.send(event);
        }
        if self.task.is_terminal() {
            self.subscribers.clear();
        }
    }
}

/// Tasks keyed by id. Every mutation of an `UploadTask` goes through here.
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
    broadcaster: TaskProgressBroadcaster,
}

impl TaskStore {
    pub fn new(broadcaster: TaskProgressBroadcaster) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, TaskEntry>> {
        match self.tasks.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, TaskEntry>> {
        match self.tasks.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Task store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn broadcaster(&self) -> &TaskProgressBroadcaster {
        &self.broadcaster
    }

    /// Registers a freshly admitted task and returns its first run.
    pub(crate) fn insert(
        &self,
        task: UploadTask,
        meta: FileMeta,
        source: ByteSource,
        policy: Arc<CategoryPolicy>,
    ) -> TaskRun {
        let event = TaskProgressEvent::from_task(&task, "Task admitted");
        let id = task.id.clone();
        let entry = TaskEntry {
            task,
            meta,
            source,
            policy,
            cancel: CancellationToken::new(),
            subscribers: Vec::new(),
        };

        let mut tasks = self.write();
        let entry = tasks.entry(id).or_insert(entry);
        entry.publish(vec![event], &self.broadcaster);
        entry.run()
    }

    pub fn get(&self, id: &TaskId) -> Option<UploadTask> {
        self.read().get(id).map(|entry| entry.task.clone())
    }

    /// Active tasks, newest first, optionally limited to one category.
    pub fn list(&self, category: Option<&str>) -> Vec<UploadTask> {
        let tasks = self.read();
        let mut result: Vec<UploadTask> = tasks
            .values()
            .filter(|entry| category.map_or(true, |c| entry.task.category == c))
            .map(|entry| entry.task.clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Opens a stream that starts with the task's current state.
    pub fn subscribe(&self, id: &TaskId) -> Result<TaskSubscription, TaskError> {
        let mut tasks = self.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let current = TaskProgressEvent::from_task(&entry.task, "Current state");
        // The receiver is alive, so this send cannot fail.
        let _ = tx.send(current);
        if !entry.task.is_terminal() {
            entry.subscribers.push(tx);
        }

        Ok(TaskSubscription::new(rx))
    }

    /// Applies a coordinator step to the task owned by `attempt`.
    ///
    /// The closure works on a copy that replaces the stored task only when it
    /// succeeds. Returns `Ok(false)` when the task was removed or a newer
    /// attempt owns it; the caller must then stop.
    pub(crate) fn apply<F>(&self, id: &TaskId, attempt: u32, step: F) -> Result<bool, TaskError>
    where
        F: FnOnce(&mut UploadTask) -> Result<Vec<TaskProgressEvent>, TaskError>,
    {
        let mut tasks = self.write();
        let entry = match tasks.get_mut(id) {
            Some(entry) if entry.task.retry_count == attempt && !entry.cancel.is_cancelled() => {
                entry
            }
            _ => return Ok(false),
        };

        let mut next = entry.task.clone();
        let events = step(&mut next)?;
        entry.task = next;
        entry.publish(events, &self.broadcaster);
        Ok(true)
    }

    /// Moves a rejected task back into `Uploading` and returns the new run.
    pub(crate) fn retry(&self, id: &TaskId) -> Result<TaskRun, TaskError> {
        let mut tasks = self.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        if entry.task.state != TaskState::Rejected {
            return Err(TaskError::InvalidStateTransition {
                task_id: id.clone(),
                from: entry.task.state,
                to: TaskState::Uploading,
            });
        }

        entry.task.reset_for_retry()?;
        entry.cancel = CancellationToken::new();
        let event = TaskProgressEvent::from_task(&entry.task, "Retrying upload");
        entry.publish(vec![event], &self.broadcaster);

        Ok(entry.run())
    }

    /// Drops the task, signals its in-flight stage and ends its subscriptions.
    pub(crate) fn remove(&self, id: &TaskId) -> Result<UploadTask, TaskError> {
        let entry = self
            .write()
            .remove(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;

        entry.cancel.cancel();
        Ok(entry.task)
    }
}
