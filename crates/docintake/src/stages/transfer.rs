//! Drives a blob-store transfer and turns byte counts into task progress.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::blob::{BlobRef, BlobStore, TransferEvent};
use crate::error::TransferError;
use crate::validator::{ByteSource, FileMeta};

use super::{with_deadline, StageOutcome};

pub struct TransferStage {
    blob_store: Arc<dyn BlobStore>,
    step_percent: u8,
    deadline: Option<Duration>,
}

impl TransferStage {
    pub fn new(blob_store: Arc<dyn BlobStore>, step_percent: u8, deadline: Option<Duration>) -> Self {
        Self {
            blob_store,
            step_percent: step_percent.max(1),
            deadline,
        }
    }

    /// Transfers `source` and reports percentages below 100 through
    /// `on_progress`. Reports are throttled to `step_percent` increments.
    ///
    /// `on_progress` returning false means the task no longer wants updates,
    /// and the transfer is abandoned as cancelled.
    pub async fn run<F>(
        &self,
        source: ByteSource,
        meta: &FileMeta,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<StageOutcome<BlobRef>, TransferError>
    where
        F: FnMut(u8) -> bool + Send,
    {
        let work = with_deadline(
            self.deadline,
            self.drive(source, meta, on_progress),
            TransferError::TimedOut,
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(StageOutcome::Cancelled),
            result = work => result,
        }
    }

    async fn drive<F>(
        &self,
        source: ByteSource,
        meta: &FileMeta,
        mut on_progress: F,
    ) -> Result<StageOutcome<BlobRef>, TransferError>
    where
        F: FnMut(u8) -> bool + Send,
    {
        let mut stream = self.blob_store.begin_transfer(source, meta).await?;
        let mut reported = 0u8;

        while let Some(event) = stream.next().await {
            match event {
                TransferEvent::Progress {
                    bytes_transferred,
                    total_bytes,
                } => {
                    let Some(percent) = percent_of(bytes_transferred, total_bytes) else {
                        continue;
                    };
                    if percent < reported.saturating_add(self.step_percent) {
                        continue;
                    }
                    reported = percent;
                    if !on_progress(percent) {
                        debug!("Progress rejected by task, abandoning transfer");
                        return Ok(StageOutcome::Cancelled);
                    }
                }
                TransferEvent::Completed(blob_ref) => return Ok(StageOutcome::Completed(blob_ref)),
                TransferEvent::Failed(reason) => return Err(TransferError::Failed(reason)),
            }
        }

        Err(TransferError::Incomplete)
    }
}

/// Integer percentage capped at 99. `None` when the total is unknown.
fn percent_of(transferred: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = u128::from(transferred.min(total)) * 100 / u128::from(total);
    Some(percent.min(99) as u8)
}
