use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub categories: Vec<CategoryPolicy>,
    #[serde(default)]
    pub progress: ProgressConfig,
    /// Deadline applied to each blob-store transfer and each parser call.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,
    #[serde(default)]
    pub blob_store: Option<BlobStoreConfig>,
    #[serde(default)]
    pub parser: Option<ParserConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Admission rules for one document category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPolicy {
    pub category_id: String,
    pub max_tasks: usize,
    pub accepted_extensions: Vec<String>,
    pub max_file_size_bytes: u64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
    /// Document-type hint handed to the parser, e.g. "cv" or "transcript".
    #[serde(default)]
    pub document_hint: Option<String>,
}

fn default_confidence_threshold() -> u8 {
    70
}

impl CategoryPolicy {
    pub fn new(
        category_id: &str,
        max_tasks: usize,
        accepted_extensions: &[&str],
        max_file_size_bytes: u64,
    ) -> Self {
        Self {
            category_id: category_id.to_string(),
            max_tasks,
            accepted_extensions: accepted_extensions.iter().map(|e| e.to_string()).collect(),
            max_file_size_bytes,
            confidence_threshold: default_confidence_threshold(),
            document_hint: None,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: u8) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_document_hint(mut self, hint: &str) -> Self {
        self.document_hint = Some(hint.to_string());
        self
    }

    /// Hint passed through to the parser. Falls back to the category id.
    pub fn document_hint(&self) -> &str {
        self.document_hint.as_deref().unwrap_or(&self.category_id)
    }

    /// Case-insensitive membership test. Listed extensions may carry a leading dot.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.accepted_extensions
            .iter()
            .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Minimum percentage advance between two published progress events.
    #[serde(default = "default_step_percent")]
    pub step_percent: u8,
    /// Capacity of the pipeline-wide broadcast channel.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_step_percent() -> u8 {
    5
}

fn default_broadcast_capacity() -> usize {
    100
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            step_percent: default_step_percent(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    pub root: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParserConfig {
    /// Local regex field extraction over the stored blob.
    Pattern { profiles: Vec<ExtractionProfile> },
    /// Remote extraction service.
    Http(HttpParserConfig),
}

/// Field patterns applied to one document hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionProfile {
    pub hint: String,
    pub fields: Vec<FieldPattern>,
}

/// A named field. The pattern must contain a capture group with the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpParserConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env_var: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_http_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
