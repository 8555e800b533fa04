//! Task coordinator: quota, the active-task map and one runner per attempt.

mod quota;
mod runner;
mod store;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::blob::BlobStore;
use crate::broadcast::{TaskProgressBroadcaster, TaskProgressEvent, TaskSubscription};
use crate::config::{CategoryPolicy, Config};
use crate::error::{RejectReason, TaskError};
use crate::parser::DocumentParser;
use crate::stages::{ExtractionStage, TransferStage};
use crate::task::{TaskId, UploadTask};
use crate::validator::FileCandidate;

pub use quota::QuotaLedger;
use store::TaskStore;

use runner::{TaskRun, TaskRunner};

/// Tunables shared by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Minimum progress increase, in percent, between two `Uploading` events.
    pub step_percent: u8,
    pub broadcast_capacity: usize,
    /// Deadline for each transfer and each parser call.
    pub stage_timeout: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            step_percent: 5,
            broadcast_capacity: 100,
            stage_timeout: None,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            step_percent: config.progress.step_percent,
            broadcast_capacity: config.progress.broadcast_capacity,
            stage_timeout: config.stage_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub struct TaskCoordinator {
    store: Arc<TaskStore>,
    quota: QuotaLedger,
    runner: Arc<TaskRunner>,
    handle: Handle,
}

impl TaskCoordinator {
    /// Tasks are spawned on `handle`.
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        parser: Arc<dyn DocumentParser>,
        options: &CoordinatorOptions,
        handle: Handle,
    ) -> Self {
        let broadcaster = TaskProgressBroadcaster::new(options.broadcast_capacity);
        let store = Arc::new(TaskStore::new(broadcaster));
        let transfer = TransferStage::new(blob_store, options.step_percent, options.stage_timeout);
        let extraction = ExtractionStage::new(parser, options.stage_timeout);
        let runner = Arc::new(TaskRunner::new(Arc::clone(&store), transfer, extraction));

        Self {
            store,
            quota: QuotaLedger::new(),
            runner,
            handle,
        }
    }

    /// Takes a quota unit, creates the task in `Uploading` and starts its transfer.
    ///
    /// The candidate must already have passed validation.
    pub fn admit(
        &self,
        policy: Arc<CategoryPolicy>,
        candidate: FileCandidate,
    ) -> Result<TaskId, RejectReason> {
        let task = UploadTask::admit(&candidate.meta, &policy.category_id)?;
        if !self.quota.try_acquire(&policy.category_id, policy.max_tasks) {
            return Err(RejectReason::QuotaExceeded {
                category: policy.category_id.clone(),
                max_tasks: policy.max_tasks,
            });
        }

        let run = self
            .store
            .insert(task, candidate.meta, candidate.source, policy);
        let id = run.id.clone();
        debug!("Admitted task {}", id);

        self.spawn(run);
        Ok(id)
    }

    /// Restarts a rejected task from `Uploading`. No extra quota is taken.
    pub fn retry(&self, id: &TaskId) -> Result<(), TaskError> {
        let run = self.store.retry(id)?;
        info!("Retrying task {} (attempt {})", id, run.attempt);
        self.spawn(run);
        Ok(())
    }

    /// Drops the task in any state and returns its quota unit.
    pub fn remove(&self, id: &TaskId) -> Result<UploadTask, TaskError> {
        let task = self.store.remove(id)?;
        self.quota.release(&task.category);
        info!("Removed task {} ({})", id, task.state);
        Ok(task)
    }

    pub fn snapshot(&self, id: &TaskId) -> Result<UploadTask, TaskError> {
        self.store
            .get(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))
    }

    pub fn subscribe(&self, id: &TaskId) -> Result<TaskSubscription, TaskError> {
        self.store.subscribe(id)
    }

    /// Every event of every task. Slow receivers may lag.
    pub fn subscribe_all(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.store.broadcaster().subscribe()
    }

    pub fn list(&self, category: Option<&str>) -> Vec<UploadTask> {
        self.store.list(category)
    }

    /// Units currently held by a category.
    pub fn quota_held(&self, category: &str) -> usize {
        self.quota.held(category)
    }

    fn spawn(&self, run: TaskRun) {
        let runner = Arc::clone(&self.runner);
        self.handle.spawn(async move { runner.run(run).await });
    }
}
