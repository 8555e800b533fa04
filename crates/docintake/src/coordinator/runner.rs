//! Drives one attempt of a task through transfer, extraction and verification.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::blob::BlobRef;
use crate::broadcast::TaskProgressEvent;
use crate::config::CategoryPolicy;
use crate::error::TaskError;
use crate::parser::ParsedDocument;
use crate::sanitize;
use crate::stages::{decide, ExtractionStage, StageOutcome, TransferStage, Verdict};
use crate::task::{FailureKind, TaskId, UploadTask};
use crate::validator::{ByteSource, FileMeta};

use super::store::TaskStore;

/// Everything an attempt needs, captured when the attempt starts.
#[derive(Debug)]
pub(crate) struct TaskRun {
    pub id: TaskId,
    /// The task's `retry_count` when this attempt began.
    pub attempt: u32,
    pub meta: FileMeta,
    pub source: ByteSource,
    pub policy: Arc<CategoryPolicy>,
    pub cancel: CancellationToken,
}

/// Why an attempt stopped before reaching a terminal state.
enum Halt {
    /// Removed, retried, or cancelled mid-stage.
    Abandoned,
    Fault(TaskError),
}

impl From<TaskError> for Halt {
    fn from(err: TaskError) -> Self {
        Halt::Fault(err)
    }
}

type Step<T> = std::result::Result<T, Halt>;

pub(crate) struct TaskRunner {
    store: Arc<TaskStore>,
    transfer: TransferStage,
    extraction: ExtractionStage,
}

impl TaskRunner {
    pub fn new(store: Arc<TaskStore>, transfer: TransferStage, extraction: ExtractionStage) -> Self {
        Self {
            store,
            transfer,
            extraction,
        }
    }

    pub async fn run(&self, run: TaskRun) {
        let span = info_span!("task",
            task_id = %run.id,
            filename = %sanitize::redact_filename(&run.meta.filename),
            category = %run.policy.category_id,
            attempt = run.attempt,
        );

        async {
            match self.drive(&run).await {
                Ok(()) => {}
                Err(Halt::Abandoned) => debug!("Attempt abandoned"),
                Err(Halt::Fault(e)) => warn!("Attempt stopped on invalid transition: {}", e),
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, run: &TaskRun) -> Step<()> {
        let blob_ref = match self.step_transfer(run).await? {
            Some(blob_ref) => blob_ref,
            None => return Ok(()),
        };

        let parsed = match self.step_extract(run, &blob_ref).await? {
            Some(parsed) => parsed,
            None => return Ok(()),
        };

        self.step_verify(run, parsed)
    }

    /// Applies a step to this attempt's task or reports it abandoned.
    fn apply<F>(&self, run: &TaskRun, step: F) -> Step<()>
    where
        F: FnOnce(&mut UploadTask) -> Result<Vec<TaskProgressEvent>, TaskError>,
    {
        if self.store.apply(&run.id, run.attempt, step)? {
            Ok(())
        } else {
            Err(Halt::Abandoned)
        }
    }

    fn fail(&self, run: &TaskRun, kind: FailureKind, reason: String) -> Step<()> {
        info!("Task rejected: {}", reason);
        self.apply(run, |task| {
            task.reject(kind, reason)?;
            Ok(vec![TaskProgressEvent::from_task(task, "Task rejected")])
        })
    }

    /// Returns `None` when the task was rejected.
    async fn step_transfer(&self, run: &TaskRun) -> Step<Option<BlobRef>> {
        let store = &self.store;
        let on_progress = |percent: u8| {
            store
                .apply(&run.id, run.attempt, |task| {
                    if task.advance_progress(percent) {
                        Ok(vec![TaskProgressEvent::from_task(task, "Uploading")])
                    } else {
                        Ok(Vec::new())
                    }
                })
                .unwrap_or(false)
        };

        let outcome = self
            .transfer
            .run(run.source.clone(), &run.meta, &run.cancel, on_progress)
            .instrument(info_span!("transfer"))
            .await;

        let blob_ref = match outcome {
            Ok(StageOutcome::Completed(blob_ref)) => blob_ref,
            Ok(StageOutcome::Cancelled) => return Err(Halt::Abandoned),
            Err(e) => {
                self.fail(run, FailureKind::Transport, e.to_string())?;
                return Ok(None);
            }
        };

        debug!("Stored as {}", blob_ref);
        let stored = blob_ref.clone();
        self.apply(run, move |task| {
            task.complete_transfer(stored)?;
            let uploaded = TaskProgressEvent::from_task(task, "Upload complete");
            task.begin_processing()?;
            let processing = TaskProgressEvent::from_task(task, "Extracting document data");
            Ok(vec![uploaded, processing])
        })?;

        Ok(Some(blob_ref))
    }

    /// Returns `None` when the task was rejected.
    async fn step_extract(&self, run: &TaskRun, blob_ref: &BlobRef) -> Step<Option<ParsedDocument>> {
        let outcome = self
            .extraction
            .run(blob_ref, run.policy.document_hint(), &run.cancel)
            .instrument(info_span!("extraction"))
            .await;

        match outcome {
            Ok(StageOutcome::Completed(parsed)) => Ok(Some(parsed)),
            Ok(StageOutcome::Cancelled) => Err(Halt::Abandoned),
            Err(e) => {
                self.fail(run, FailureKind::Extraction, format!("extraction failed: {}", e))?;
                Ok(None)
            }
        }
    }

    fn step_verify(&self, run: &TaskRun, parsed: ParsedDocument) -> Step<()> {
        let _span = info_span!("verification").entered();
        let score = parsed.confidence_score;
        let threshold = run.policy.confidence_threshold;

        self.apply(run, move |task| {
            task.record_confidence(score)?;
            let scored = TaskProgressEvent::from_task(task, "Extraction complete");
            let decided = match decide(score, threshold) {
                Verdict::Verified => {
                    task.verify(parsed.parsed_data)?;
                    TaskProgressEvent::from_task(task, "Document verified")
                }
                Verdict::Rejected(reason) => {
                    task.reject(FailureKind::LowConfidence, reason)?;
                    TaskProgressEvent::from_task(task, "Task rejected")
                }
            };
            Ok(vec![scored, decided])
        })?;

        info!(score, threshold, "Verification finished");
        Ok(())
    }
}
