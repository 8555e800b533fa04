//! Task progress events and the pipeline-wide broadcaster.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::task::{FailureKind, TaskId, TaskState, UploadTask};

/// A point-in-time view of one task, published on every state or progress change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEvent {
    /// Unique task identifier.
    pub task_id: TaskId,
    /// Original filename of the upload.
    pub filename: String,
    /// Category whose policy applies.
    pub category: String,
    /// State after this event.
    pub state: TaskState,
    /// Transfer progress, 0-100.
    pub progress: u8,
    /// Retries performed so far.
    pub retry_count: u32,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    /// Extraction confidence (set once extraction completes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<u8>,
    /// Extracted fields (set on verification).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Map<String, Value>>,
    /// Rejection cause (set on rejection).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl TaskProgressEvent {
    pub fn from_task(task: &UploadTask, message: &str) -> Self {
        Self {
            task_id: task.id.clone(),
            filename: task.filename.clone(),
            category: task.category.clone(),
            state: task.state,
            progress: task.progress,
            retry_count: task.retry_count,
            message: message.to_string(),
            timestamp: Utc::now(),
            confidence_score: task.confidence_score,
            parsed_data: task.parsed_data.clone(),
            error_reason: task.error_reason.clone(),
            failure_kind: task.failure_kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Fans out every task event to pipeline-wide subscribers (dashboards, logs).
///
/// Slow receivers may observe `RecvError::Lagged`; per-task subscriptions
/// never drop events.
#[derive(Clone)]
pub struct TaskProgressBroadcaster {
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: TaskProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for TaskProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
