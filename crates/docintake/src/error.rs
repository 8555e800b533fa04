use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::task::{TaskId, TaskState};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No tokio runtime available to drive upload tasks")]
    NoRuntime,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unknown document category '{0}'")]
    UnknownCategory(String),

    #[error("Invalid field pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Why a candidate file failed the category policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("file '{filename}' has no extension")]
    MissingExtension { filename: String },

    #[error("unsupported file extension '.{extension}' (accepted: {accepted})")]
    UnsupportedExtension { extension: String, accepted: String },

    #[error("exceeds max size: {size} > {max} bytes")]
    ExceedsMaxSize { size: u64, max: u64 },
}

/// Per-candidate admission failure returned by `submit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("quota exceeded for category '{category}' (max {max_tasks} tasks)")]
    QuotaExceeded { category: String, max_tasks: usize },

    #[error("task could not be created: {0}")]
    Task(#[from] TaskError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid blob reference: {0}")]
    InvalidBlobRef(String),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

/// Failure while moving bytes into the blob store.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{0}")]
    Failed(String),

    #[error("transfer ended before completion")]
    Incomplete,

    #[error("transfer timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure while invoking the content extraction service.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{0}")]
    Failed(String),

    #[error("confidence score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),

    #[error("no extraction profile for document hint '{0}'")]
    UnknownHint(String),

    #[error("extraction timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
