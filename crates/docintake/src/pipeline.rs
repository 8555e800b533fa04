//! Caller-facing entry point.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{info, info_span, warn};

use crate::blob::{BlobStore, FilesystemBlobStore};
use crate::broadcast::{TaskProgressEvent, TaskSubscription};
use crate::config::{Config, ParserConfig};
use crate::coordinator::{CoordinatorOptions, TaskCoordinator};
use crate::error::{ConfigError, IntakeError, RejectReason, TaskError};
use crate::parser::{DocumentParser, HttpDocumentParser, PatternParser};
use crate::policy::{PolicyRegistry, PolicySource};
use crate::sanitize;
use crate::task::{TaskId, UploadTask};
use crate::validator::{validate, FileCandidate};

/// Outcome of one candidate in a `submit` batch, in input order.
pub type SubmitOutcome = Result<TaskId, RejectReason>;

/// Quota occupancy of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub category: String,
    pub held: usize,
    pub max_tasks: usize,
}

pub struct IntakePipeline {
    policies: Arc<dyn PolicySource>,
    coordinator: TaskCoordinator,
}

impl IntakePipeline {
    /// Must be called from within a tokio runtime; tasks run on it.
    pub fn new(
        policies: Arc<dyn PolicySource>,
        blob_store: Arc<dyn BlobStore>,
        parser: Arc<dyn DocumentParser>,
        options: CoordinatorOptions,
    ) -> Result<Self, IntakeError> {
        let handle = Handle::try_current().map_err(|_| IntakeError::NoRuntime)?;
        let coordinator = TaskCoordinator::new(blob_store, parser, &options, handle);
        Ok(Self {
            policies,
            coordinator,
        })
    }

    /// Builds the registry, filesystem blob store and configured parser.
    pub fn from_config(config: &Config) -> Result<Self, IntakeError> {
        let blob_config = config.blob_store.as_ref().ok_or_else(|| ConfigError::Validation {
            message: "blob_store section is required".to_string(),
        })?;
        let parser_config = config.parser.as_ref().ok_or_else(|| ConfigError::Validation {
            message: "parser section is required".to_string(),
        })?;

        let store = Arc::new(
            FilesystemBlobStore::new(PathBuf::from(&blob_config.root))
                .with_chunk_size(blob_config.chunk_size),
        );
        let parser: Arc<dyn DocumentParser> = match parser_config {
            ParserConfig::Pattern { profiles } => {
                Arc::new(PatternParser::new(Arc::clone(&store), profiles)?)
            }
            ParserConfig::Http(http) => Arc::new(HttpDocumentParser::new(http)?),
        };

        Self::new(
            Arc::new(PolicyRegistry::from_config(config)),
            store,
            parser,
            CoordinatorOptions::from_config(config),
        )
    }

    /// Validates and admits each candidate independently.
    ///
    /// An unknown category fails the whole call. Otherwise every candidate
    /// gets its own outcome, in input order.
    pub fn submit(
        &self,
        category_id: &str,
        candidates: Vec<FileCandidate>,
    ) -> Result<Vec<SubmitOutcome>, IntakeError> {
        let policy = self.policies.get_policy(category_id)?;
        let _span = info_span!("submit", category = %category_id, count = candidates.len()).entered();

        let outcomes: Vec<SubmitOutcome> = candidates
            .into_iter()
            .map(|candidate| {
                let filename = sanitize::redact_filename(&candidate.meta.filename);
                let outcome = match validate(&candidate.meta, &policy) {
                    Ok(()) => self.coordinator.admit(Arc::clone(&policy), candidate),
                    Err(e) => Err(e.into()),
                };
                match &outcome {
                    Ok(id) => info!(task_id = %id, "Admitted {}", filename),
                    Err(reason) => warn!("Not admitted: {}: {}", filename, reason),
                }
                outcome
            })
            .collect();

        let admitted = outcomes.iter().filter(|o| o.is_ok()).count();
        info!(admitted, rejected = outcomes.len() - admitted, "Submission processed");
        Ok(outcomes)
    }

    pub fn subscribe(&self, id: &TaskId) -> Result<TaskSubscription, TaskError> {
        self.coordinator.subscribe(id)
    }

    /// Events for every task in the pipeline.
    pub fn subscribe_all(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.coordinator.subscribe_all()
    }

    pub fn retry(&self, id: &TaskId) -> Result<(), TaskError> {
        self.coordinator.retry(id)
    }

    /// Removes the task in any state, stopping its work and freeing its quota unit.
    pub fn remove(&self, id: &TaskId) -> Result<UploadTask, TaskError> {
        self.coordinator.remove(id)
    }

    pub fn snapshot(&self, id: &TaskId) -> Result<UploadTask, TaskError> {
        self.coordinator.snapshot(id)
    }

    pub fn list(&self, category: Option<&str>) -> Vec<UploadTask> {
        self.coordinator.list(category)
    }

    pub fn quota_usage(&self, category_id: &str) -> Result<QuotaUsage, ConfigError> {
        let policy = self.policies.get_policy(category_id)?;
        Ok(QuotaUsage {
            category: policy.category_id.clone(),
            held: self.coordinator.quota_held(category_id),
            max_tasks: policy.max_tasks,
        })
    }
}
