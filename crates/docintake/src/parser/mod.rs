//! Content extraction boundary.

pub mod http;
pub mod pattern;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blob::BlobRef;
use crate::error::ExtractionError;

pub use http::HttpDocumentParser;
pub use pattern::PatternParser;

/// Structured fields extracted from a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocument {
    /// Certainty that the extracted fields are correct, 0-100.
    pub confidence_score: u8,
    pub parsed_data: Map<String, Value>,
}

impl ParsedDocument {
    /// Builds a document from an unchecked score.
    pub fn from_raw_score(score: i64, parsed_data: Map<String, Value>) -> Result<Self, ExtractionError> {
        match u8::try_from(score) {
            Ok(confidence_score) if confidence_score <= 100 => Ok(Self {
                confidence_score,
                parsed_data,
            }),
            _ => Err(ExtractionError::ScoreOutOfRange(score)),
        }
    }
}

/// The extraction service. `document_hint` is passed through from the
/// category policy unchanged.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse_document(
        &self,
        blob_ref: &BlobRef,
        document_hint: &str,
    ) -> Result<ParsedDocument, ExtractionError>;
}
