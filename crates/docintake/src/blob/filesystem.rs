use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{StorageError, TransferError};
use crate::sanitize;
use crate::validator::{ByteSource, FileMeta};

use super::{BlobRef, BlobStore, TransferEvent, TransferStream};

const REF_PREFIX: &str = "fs:";
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Stores blobs under `root/<yyyy>/<mm>/<filename>`.
///
/// Bytes are written chunk by chunk on a background task which reports
/// progress after every chunk.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
    chunk_size: usize,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a reference to a path under the root, refusing anything that
    /// would escape it.
    pub fn path_for(&self, blob_ref: &BlobRef) -> Result<PathBuf, StorageError> {
        let relative = blob_ref
            .as_str()
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| StorageError::InvalidBlobRef(blob_ref.to_string()))?;

        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidBlobRef(blob_ref.to_string()));
        }

        Ok(self.root.join(relative))
    }

    pub async fn read(&self, blob_ref: &BlobRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(blob_ref)?;
        fs::read(&path)
            .await
            .map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Creates an empty destination file, appending `_2`, `_3`, ... on conflict.
    async fn create_destination(&self, filename: &str) -> Result<(File, String), StorageError> {
        let now = Utc::now();
        let relative_dir = format!("{:04}/{:02}", now.year(), now.month());
        let dir_path = self.root.join(&relative_dir);
        fs::create_dir_all(&dir_path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: dir_path.clone(),
                source: e,
            })?;

        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            _ => (filename, None),
        };

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let try_path = dir_path.join(&try_filename);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
                .await
            {
                Ok(file) => return Ok((file, format!("{}/{}", relative_dir, try_filename))),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    })
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(filename)))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn begin_transfer(
        &self,
        source: ByteSource,
        meta: &FileMeta,
    ) -> Result<TransferStream, TransferError> {
        let filename = sanitize::sanitize_filename(&meta.filename);
        let (file, relative) = self.create_destination(&filename).await?;
        let path = self.root.join(&relative);
        let chunk_size = self.chunk_size;
        let declared = meta.size;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let outcome = copy_chunks(source, file, chunk_size, declared, &tx).await;
            match outcome {
                Ok(true) => {
                    let blob_ref = BlobRef::new(format!("{}{}", REF_PREFIX, relative));
                    debug!("Stored blob {}", blob_ref);
                    let _ = tx.send(TransferEvent::Completed(blob_ref)).await;
                }
                Ok(false) => {
                    debug!("Transfer abandoned, removing partial blob");
                    let _ = fs::remove_file(&path).await;
                }
                Err(message) => {
                    warn!("Blob transfer failed: {}", message);
                    let _ = fs::remove_file(&path).await;
                    let _ = tx.send(TransferEvent::Failed(message)).await;
                }
            }
        });

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }
}

/// Copies `source` into `file`. Returns `Ok(false)` when the receiver went
/// away before the copy finished.
///
/// The copy fails as soon as more than `declared` bytes have arrived.
async fn copy_chunks(
    source: ByteSource,
    mut file: File,
    chunk_size: usize,
    declared: u64,
    tx: &mpsc::Sender<TransferEvent>,
) -> Result<bool, String> {
    let total_bytes = match &source {
        ByteSource::Memory(bytes) => bytes.len() as u64,
        ByteSource::File(path) => fs::metadata(path)
            .await
            .map_err(|e| format!("failed to read source metadata: {}", e))?
            .len(),
    };
    if total_bytes > declared {
        return Err(oversized(total_bytes, declared));
    }
    let mut transferred = 0u64;

    match source {
        ByteSource::Memory(bytes) => {
            for chunk in bytes.chunks(chunk_size) {
                file.write_all(chunk)
                    .await
                    .map_err(|e| format!("failed to write blob: {}", e))?;
                transferred += chunk.len() as u64;
                if !report(tx, transferred, total_bytes).await {
                    return Ok(false);
                }
            }
        }
        ByteSource::File(path) => {
            let mut input = File::open(&path)
                .await
                .map_err(|e| format!("failed to open source: {}", e))?;
            let mut buffer = vec![0u8; chunk_size];
            loop {
                let read = input
                    .read(&mut buffer)
                    .await
                    .map_err(|e| format!("failed to read source: {}", e))?;
                if read == 0 {
                    break;
                }
                file.write_all(&buffer[..read])
                    .await
                    .map_err(|e| format!("failed to write blob: {}", e))?;
                transferred += read as u64;
                if transferred > declared {
                    return Err(oversized(transferred, declared));
                }
                if !report(tx, transferred, total_bytes.max(transferred)).await {
                    return Ok(false);
                }
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| format!("failed to flush blob: {}", e))?;
    Ok(true)
}

fn oversized(received: u64, declared: u64) -> String {
    format!(
        "received more bytes than declared: {} > {}",
        received, declared
    )
}

async fn report(tx: &mpsc::Sender<TransferEvent>, transferred: u64, total: u64) -> bool {
    tx.send(TransferEvent::Progress {
        bytes_transferred: transferred,
        total_bytes: total,
    })
    .await
    .is_ok()
}
