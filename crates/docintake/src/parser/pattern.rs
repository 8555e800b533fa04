//! Local parser that extracts named fields from stored text with regexes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

use crate::blob::{BlobRef, FilesystemBlobStore};
use crate::config::{ExtractionProfile, FieldPattern};
use crate::error::{ConfigError, ExtractionError};

use super::{DocumentParser, ParsedDocument};

struct CompiledField {
    name: String,
    regex: Regex,
}

/// Confidence is the share of profile fields found in the document.
pub struct PatternParser {
    store: Arc<FilesystemBlobStore>,
    profiles: HashMap<String, Vec<CompiledField>>,
}

impl PatternParser {
    pub fn new(
        store: Arc<FilesystemBlobStore>,
        profiles: &[ExtractionProfile],
    ) -> Result<Self, ConfigError> {
        let profiles = profiles
            .iter()
            .map(|profile| {
                let fields = profile
                    .fields
                    .iter()
                    .map(compile_field)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((profile.hint.clone(), fields))
            })
            .collect::<Result<HashMap<_, _>, ConfigError>>()?;

        Ok(Self { store, profiles })
    }

    /// Runs a profile over text. Exposed for callers that already hold the text.
    pub fn extract(
        &self,
        text: &str,
        document_hint: &str,
    ) -> Result<ParsedDocument, ExtractionError> {
        let fields = self
            .profiles
            .get(document_hint)
            .ok_or_else(|| ExtractionError::UnknownHint(document_hint.to_string()))?;

        let mut parsed_data = Map::new();
        for field in fields {
            if let Some(value) = field
                .regex
                .captures(text)
                .and_then(|caps| caps.name(&field.name))
            {
                parsed_data.insert(
                    field.name.clone(),
                    Value::String(value.as_str().trim().to_string()),
                );
            }
        }

        let confidence_score = confidence(parsed_data.len(), fields.len());
        Ok(ParsedDocument {
            confidence_score,
            parsed_data,
        })
    }
}

fn compile_field(field: &FieldPattern) -> Result<CompiledField, ConfigError> {
    let regex = Regex::new(&field.pattern).map_err(|e| ConfigError::InvalidPattern {
        name: field.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(CompiledField {
        name: field.name.clone(),
        regex,
    })
}

/// Rounded percentage of matched fields. An empty profile scores 0.
fn confidence(matched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (matched * 200 + total) / (total * 2);
    percent.min(100) as u8
}

#[async_trait]
impl DocumentParser for PatternParser {
    async fn parse_document(
        &self,
        blob_ref: &BlobRef,
        document_hint: &str,
    ) -> Result<ParsedDocument, ExtractionError> {
        let bytes = self.store.read(blob_ref).await?;
        let text = String::from_utf8_lossy(&bytes);
        self.extract(&text, document_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{BlobStore, TransferEvent};
    use crate::validator::{ByteSource, FileMeta};
    use futures_util::StreamExt;
    use tempfile::TempDir;

    fn transcript_profile() -> ExtractionProfile {
        ExtractionProfile {
            hint: "transcript".to_string(),
            fields: vec![
                FieldPattern {
                    name: "student".to_string(),
                    pattern: r"Student:\s*(?P<student>[^\n]+)".to_string(),
                },
                FieldPattern {
                    name: "gpa".to_string(),
                    pattern: r"GPA:\s*(?P<gpa>\d+\.\d+)".to_string(),
                },
                FieldPattern {
                    name: "institution".to_string(),
                    pattern: r"Institution:\s*(?P<institution>[^\n]+)".to_string(),
                },
            ],
        }
    }

    fn parser(store: Arc<FilesystemBlobStore>) -> PatternParser {
        PatternParser::new(store, &[transcript_profile()]).unwrap()
    }

    #[test]
    fn test_confidence_rounding() {
        assert_eq!(confidence(0, 3), 0);
        assert_eq!(confidence(1, 3), 33);
        assert_eq!(confidence(2, 3), 67);
        assert_eq!(confidence(3, 3), 100);
        assert_eq!(confidence(0, 0), 0);
    }

    #[test]
    fn test_extract_all_fields() {
        let parser = parser(Arc::new(FilesystemBlobStore::new("/unused")));
        let text = "Student: Ada Lovelace\nInstitution: University of London\nGPA: 3.95\n";

        let parsed = parser.extract(text, "transcript").unwrap();
        assert_eq!(parsed.confidence_score, 100);
        assert_eq!(parsed.parsed_data["student"], "Ada Lovelace");
        assert_eq!(parsed.parsed_data["gpa"], "3.95");
    }

    #[test]
    fn test_extract_partial_match_lowers_confidence() {
        let parser = parser(Arc::new(FilesystemBlobStore::new("/unused")));
        let parsed = parser.extract("Student: Ada Lovelace", "transcript").unwrap();

        assert_eq!(parsed.confidence_score, 33);
        assert_eq!(parsed.parsed_data.len(), 1);
    }

    #[test]
    fn test_unknown_hint() {
        let parser = parser(Arc::new(FilesystemBlobStore::new("/unused")));
        let result = parser.extract("anything", "certificate");
        assert!(matches!(result, Err(ExtractionError::UnknownHint(ref h)) if h == "certificate"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let profile = ExtractionProfile {
            hint: "cv".to_string(),
            fields: vec![FieldPattern {
                name: "email".to_string(),
                pattern: "(?P<email>[".to_string(),
            }],
        };
        let result = PatternParser::new(Arc::new(FilesystemBlobStore::new("/unused")), &[profile]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_parse_stored_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FilesystemBlobStore::new(temp_dir.path()));
        let content = b"Student: Grace Hopper\nGPA: 4.00\nInstitution: Yale\n".to_vec();

        let meta = FileMeta::new("t.txt", content.len() as u64);

        let mut stream = store
            .begin_transfer(ByteSource::from_bytes(content), &meta)
            .await
            .unwrap();
        let mut blob_ref = None;
        while let Some(event) = stream.next().await {
            if let TransferEvent::Completed(r) = event {
                blob_ref = Some(r);
            }
        }

        let parsed = parser(Arc::clone(&store))
            .parse_document(&blob_ref.unwrap(), "transcript")
            .await
            .unwrap();
        assert_eq!(parsed.confidence_score, 100);
        assert_eq!(parsed.parsed_data["institution"], "Yale");
    }

    #[tokio::test]
    async fn test_parse_missing_blob_fails() {
        let temp_dir = TempDir::new().unwrap();
        let parser = parser(Arc::new(FilesystemBlobStore::new(temp_dir.path())));
        let result = parser
            .parse_document(&BlobRef::new("fs:2026/01/none.txt"), "transcript")
            .await;
        assert!(matches!(result, Err(ExtractionError::Storage(_))));
    }
}
