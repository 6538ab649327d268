//! Overwrite/append reconciliation.
//!
//! Append is the awkward discipline: most object stores can only replace.
//! Backends with a native append primitive get the call passed straight
//! through; everyone else gets append emulated as one concatenated
//! Overwrite upload. The concatenation stays in memory below the
//! configured spill threshold and goes through a temp file at or above it,
//! so a large append never balloons the heap. A payload with no declared
//! length is treated as large.

use std::io::SeekFrom;

use diagnostics::log_debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::backend::{ByteStream, ObjectBackend};
use crate::config::FileStoreOptions;
use crate::error::{Error, Result};
use crate::path;
use crate::transfer;

/// How an update replaces or extends the target object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Replace the full object content.
    Overwrite,
    /// Extend existing content, creating the object if absent.
    Append,
}

const COPY_CHUNK: usize = 64 * 1024;

/// Copies `reader` into `writer`, checking for cancellation between
/// chunks so a long upload aborts promptly.
pub(crate) async fn copy_cancellable<R, W>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    Ok(total)
}

/// Applies `content` to the object at `abs_segments` in the given mode.
pub(crate) async fn apply(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    cancel: &CancellationToken,
    abs_segments: &[String],
    mode: UpdateMode,
    content: ByteStream,
) -> Result<()> {
    let caps = backend.capabilities();
    let key = path::join(abs_segments);
    if caps.hierarchical {
        // A directory sitting where the object should go is never
        // overwritten or extended implicitly.
        if let Some(meta) = backend.object_metadata(&key).await? {
            if meta.is_directory {
                return Err(Error::conflict(key, "target is a directory"));
            }
        }
        if abs_segments.len() > 1 {
            transfer::ensure_directory_path(backend, &abs_segments[..abs_segments.len() - 1])
                .await?;
        }
    }
    match mode {
        UpdateMode::Overwrite => backend.put_object(&key, content).await,
        UpdateMode::Append if caps.supports_native_append => {
            backend.append_object(&key, content).await
        }
        UpdateMode::Append => emulate_append(backend, options, cancel, &key, content).await,
    }
}

/// Append on a backend that can only overwrite: download what is there,
/// concatenate the new bytes behind it, upload the whole thing.
async fn emulate_append(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    cancel: &CancellationToken,
    key: &str,
    content: ByteStream,
) -> Result<()> {
    let existing_size = match backend.object_metadata(key).await? {
        Some(meta) if meta.is_directory => {
            return Err(Error::conflict(key, "cannot append to a directory"));
        }
        Some(meta) => Some(meta.size),
        // Absent target: append becomes create.
        None => None,
    };

    let total = match (existing_size, content.length()) {
        (Some(existing), Some(new)) => Some(existing + new),
        (None, Some(new)) => Some(new),
        _ => None,
    };

    match total {
        Some(total) if total < options.spill_threshold => {
            let mut buf: Vec<u8> = Vec::with_capacity(total as usize);
            if existing_size.is_some() {
                let mut reader = backend.object_reader(key).await?.into_reader();
                reader.read_to_end(&mut buf).await?;
            }
            let mut reader = content.into_reader();
            reader.read_to_end(&mut buf).await?;
            backend.put_object(key, ByteStream::from_bytes(buf)).await
        }
        _ => {
            log_debug!("append to {key} spilling concatenation to disk");
            let mut spill = tokio::fs::File::from_std(tempfile::tempfile()?);
            if existing_size.is_some() {
                let mut reader = backend.object_reader(key).await?.into_reader();
                copy_cancellable(&mut reader, &mut spill, cancel).await?;
            }
            let mut reader = content.into_reader();
            copy_cancellable(&mut reader, &mut spill, cancel).await?;
            spill.flush().await?;
            spill.seek(SeekFrom::Start(0)).await?;
            let concatenated = ByteStream::from_file(spill).await?;
            backend.put_object(key, concatenated).await
        }
    }
}
