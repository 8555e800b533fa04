//! Admission checks applied to a candidate file before any task exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::CategoryPolicy;
use crate::error::ValidationError;

/// Metadata declared for a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub filename: String,
    /// Declared size in bytes.
    pub size: u64,
    pub mime_type: Option<String>,
}

impl FileMeta {
    /// Creates metadata, guessing the MIME type from the filename.
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        let filename = filename.into();
        let mime_type = detect_mime_type(&filename);
        Self {
            filename,
            size,
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Lower-cased substring after the final `.`, if there is a `.` at all.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

fn detect_mime_type(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.to_string())
}

/// Where the bytes of a candidate come from. Cheap to clone so a retry can
/// transfer the same content again.
#[derive(Debug, Clone)]
pub enum ByteSource {
    Memory(Arc<[u8]>),
    File(PathBuf),
}

impl ByteSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ByteSource::Memory(Arc::from(bytes.into()))
    }
}

/// A file offered to `submit`.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub meta: FileMeta,
    pub source: ByteSource,
}

impl FileCandidate {
    pub fn new(meta: FileMeta, source: ByteSource) -> Self {
        Self { meta, source }
    }

    /// In-memory candidate whose declared size is the buffer length.
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let meta = FileMeta::new(filename, bytes.len() as u64);
        Self::new(meta, ByteSource::from_bytes(bytes))
    }

    /// Candidate backed by a file on disk. Size comes from the file metadata.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self::new(
            FileMeta::new(filename, size),
            ByteSource::File(path.to_path_buf()),
        ))
    }
}

/// Checks a candidate against its category policy.
///
/// Extension membership is checked first, then size. The first violated rule
/// is returned.
pub fn validate(meta: &FileMeta, policy: &CategoryPolicy) -> Result<(), ValidationError> {
    let extension = meta
        .extension()
        .ok_or_else(|| ValidationError::MissingExtension {
            filename: meta.filename.clone(),
        })?;

    if !policy.accepts_extension(&extension) {
        return Err(ValidationError::UnsupportedExtension {
            extension,
            accepted: policy.accepted_extensions.join(", "),
        });
    }

    if meta.size > policy.max_file_size_bytes {
        return Err(ValidationError::ExceedsMaxSize {
            size: meta.size,
            max: policy.max_file_size_bytes,
        });
    }

    Ok(())
}
