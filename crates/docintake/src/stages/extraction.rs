//! Invokes the document parser for a stored blob.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::blob::BlobRef;
use crate::error::ExtractionError;
use crate::parser::{DocumentParser, ParsedDocument};

use super::{with_deadline, StageOutcome};

pub struct ExtractionStage {
    parser: Arc<dyn DocumentParser>,
    deadline: Option<Duration>,
}

impl ExtractionStage {
    pub fn new(parser: Arc<dyn DocumentParser>, deadline: Option<Duration>) -> Self {
        Self { parser, deadline }
    }

    pub async fn run(
        &self,
        blob_ref: &BlobRef,
        document_hint: &str,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome<ParsedDocument>, ExtractionError> {
        let work = with_deadline(
            self.deadline,
            self.parser.parse_document(blob_ref, document_hint),
            ExtractionError::TimedOut,
        );

        let parsed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StageOutcome::Cancelled),
            result = work => result?,
        };

        // Parsers outside this crate may build the struct directly.
        if parsed.confidence_score > 100 {
            return Err(ExtractionError::ScoreOutOfRange(i64::from(
                parsed.confidence_score,
            )));
        }

        Ok(StageOutcome::Completed(parsed))
    }
}
