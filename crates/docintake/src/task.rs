//! Upload task record and its state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blob::BlobRef;
use crate::error::TaskError;
use crate::validator::FileMeta;

/// Opaque task identifier. Generated once per admitted file and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of an upload task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    /// Never entered: candidates are validated before a task exists.
    Validating,
    Uploading,
    Uploaded,
    Processing,
    Verified,
    Rejected,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Verified | TaskState::Rejected)
    }

    /// The transition table. Every state change goes through this check.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Queued, Uploading)
                | (Uploading, Uploaded)
                | (Uploading, Rejected)
                | (Uploaded, Processing)
                | (Processing, Verified)
                | (Processing, Rejected)
                | (Rejected, Uploading)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Queued => write!(f, "Queued"),
            TaskState::Validating => write!(f, "Validating"),
            TaskState::Uploading => write!(f, "Uploading"),
            TaskState::Uploaded => write!(f, "Uploaded"),
            TaskState::Processing => write!(f, "Processing"),
            TaskState::Verified => write!(f, "Verified"),
            TaskState::Rejected => write!(f, "Rejected"),
        }
    }
}

/// What put a task into `Rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Extraction,
    LowConfidence,
}

/// One admitted file moving through transfer, extraction and verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub id: TaskId,
    pub filename: String,
    pub declared_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_mime_type: Option<String>,
    pub category: String,
    pub state: TaskState,
    /// Transfer progress, 0-100.
    pub progress: u8,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_ref: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    /// Creates a task for an admitted file, already moved from `Queued` to `Uploading`.
    pub(crate) fn admit(meta: &FileMeta, category: &str) -> Result<Self, TaskError> {
        let now = Utc::now();
        let mut task = Self {
            id: TaskId::generate(),
            filename: meta.filename.clone(),
            declared_size: meta.size,
            declared_mime_type: meta.mime_type.clone(),
            category: category.to_string(),
            state: TaskState::Queued,
            progress: 0,
            retry_count: 0,
            parsed_data: None,
            confidence_score: None,
            error_reason: None,
            failure_kind: None,
            blob_ref: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        task.transition(TaskState::Uploading)?;
        Ok(task)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: TaskState) -> Result<(), TaskError> {
        if !self.state.can_transition_to(next) {
            return Err(TaskError::InvalidStateTransition {
                task_id: self.id.clone(),
                from: self.state,
                to: next,
            });
        }

        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        self.completed_at = if next.is_terminal() { Some(now) } else { None };
        Ok(())
    }

    /// Raises transfer progress. Returns false when nothing changed.
    ///
    /// Values are capped at 99: only `complete_transfer` may reach 100.
    pub(crate) fn advance_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(99);
        if self.state != TaskState::Uploading || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        self.updated_at = Utc::now();
        true
    }

    pub(crate) fn complete_transfer(&mut self, blob_ref: BlobRef) -> Result<(), TaskError> {
        self.transition(TaskState::Uploaded)?;
        self.progress = 100;
        self.blob_ref = Some(blob_ref);
        Ok(())
    }

    pub(crate) fn begin_processing(&mut self) -> Result<(), TaskError> {
        self.transition(TaskState::Processing)
    }

    pub(crate) fn record_confidence(&mut self, score: u8) -> Result<(), TaskError> {
        if self.state != TaskState::Processing {
            return Err(TaskError::InvalidStateTransition {
                task_id: self.id.clone(),
                from: self.state,
                to: TaskState::Processing,
            });
        }
        self.confidence_score = Some(score);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn verify(&mut self, parsed_data: Map<String, Value>) -> Result<(), TaskError> {
        self.transition(TaskState::Verified)?;
        self.parsed_data = Some(parsed_data);
        Ok(())
    }

    pub(crate) fn reject(&mut self, kind: FailureKind, reason: String) -> Result<(), TaskError> {
        self.transition(TaskState::Rejected)?;
        self.failure_kind = Some(kind);
        self.error_reason = Some(reason);
        Ok(())
    }

    /// Clears the previous attempt's outcome and re-enters `Uploading`.
    pub(crate) fn reset_for_retry(&mut self) -> Result<(), TaskError> {
        self.transition(TaskState::Uploading)?;
        self.progress = 0;
        self.confidence_score = None;
        self.parsed_data = None;
        self.error_reason = None;
        self.failure_kind = None;
        self.blob_ref = None;
        self.retry_count += 1;
        Ok(())
    }
}
