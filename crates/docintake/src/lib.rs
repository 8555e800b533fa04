//! Document intake: validate candidate files against a per-category policy,
//! move their bytes into a blob store, extract structured data and gate the
//! result on a confidence threshold.

pub mod blob;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod policy;
pub mod sanitize;
pub mod secrets;
pub mod stages;
pub mod task;
pub mod validator;

pub use blob::{BlobRef, BlobStore, FilesystemBlobStore, TransferEvent, TransferStream};
pub use broadcast::{TaskProgressBroadcaster, TaskProgressEvent, TaskSubscription};
pub use config::{load_config, parse_config, CategoryPolicy, Config, ConfigFormat};
pub use coordinator::{CoordinatorOptions, TaskCoordinator};
pub use error::{
    ConfigError, ExtractionError, IntakeError, RejectReason, Result, StorageError, TaskError,
    TransferError, ValidationError,
};
pub use logging::{init_logging, LoggingError};
pub use parser::{DocumentParser, HttpDocumentParser, ParsedDocument, PatternParser};
pub use pipeline::{IntakePipeline, QuotaUsage, SubmitOutcome};
pub use policy::{PolicyRegistry, PolicySource};
pub use secrets::{SecretError, SecretSources};
pub use task::{FailureKind, TaskId, TaskState, UploadTask};
pub use validator::{validate, ByteSource, FileCandidate, FileMeta};
