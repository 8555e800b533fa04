//! Blob store boundary: where uploaded bytes end up.

pub mod filesystem;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::validator::{ByteSource, FileMeta};

pub use filesystem::FilesystemBlobStore;

/// Opaque handle to stored bytes, independent of the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signal emitted by a running transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress {
        bytes_transferred: u64,
        total_bytes: u64,
    },
    Completed(BlobRef),
    Failed(String),
}

pub type TransferStream = BoxStream<'static, TransferEvent>;

/// Durable byte storage.
///
/// Dropping the returned stream abandons the transfer.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn begin_transfer(
        &self,
        source: ByteSource,
        meta: &FileMeta,
    ) -> Result<TransferStream, TransferError>;
}
