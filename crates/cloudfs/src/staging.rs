//! Local staging buffers.
//!
//! A staging handle is an anonymous temp file seeded from the remote
//! object (or empty when the object does not exist yet — that is how new
//! files are created). The caller reads and writes it with the ordinary
//! tokio io traits; closing a write-intent handle uploads the buffer back
//! with Overwrite exactly once. The temp file itself is unlinked by the OS
//! whatever happens, so no exit path can leak it.

use std::io::SeekFrom;
use std::pin::Pin;
use std::task::{Context, Poll};

use diagnostics::log_warn;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::backend::ByteStream;
use crate::error::Result;
use crate::path;
use crate::provider::FileStore;
use crate::update::UpdateMode;

/// A remote file staged on local disk for the duration of caller use.
pub struct LocalStaging {
    file: Option<tokio::fs::File>,
    store: FileStore,
    target: Vec<String>,
    read_only: bool,
    committed: bool,
}

impl std::fmt::Debug for LocalStaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStaging")
            .field("target", &self.target)
            .field("read_only", &self.read_only)
            .field("committed", &self.committed)
            .field("open", &self.file.is_some())
            .finish()
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::other("staging stream already closed")
}

impl LocalStaging {
    pub(crate) fn new(
        file: tokio::fs::File,
        store: FileStore,
        target: Vec<String>,
        read_only: bool,
    ) -> Self {
        LocalStaging {
            file: Some(file),
            store,
            target,
            read_only,
            committed: false,
        }
    }

    /// Absolute segments of the object this buffer stands in for.
    pub fn target_segments(&self) -> &[String] {
        &self.target
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the buffer has been committed back to the backend.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Releases the buffer. On a write-intent handle the first call seeks
    /// to the start and uploads the full content with Overwrite; further
    /// calls do nothing toward the backend. Read-only handles never touch
    /// the backend.
    pub async fn close(&mut self) -> Result<()> {
        if !self.read_only && !self.committed {
            if let Some(file) = self.file.as_mut() {
                file.flush().await?;
                file.seek(SeekFrom::Start(0)).await?;
                let upload = file.try_clone().await?;
                let content = ByteStream::from_file(upload).await?;
                self.store
                    .update_absolute(&self.target, UpdateMode::Overwrite, content)
                    .await?;
                self.committed = true;
            }
        }
        self.file = None;
        Ok(())
    }
}

impl Drop for LocalStaging {
    fn drop(&mut self) {
        // The temp file is reclaimed by the OS on drop; only an uncommitted
        // write buffer is worth flagging, since its changes are gone.
        if !self.read_only && !self.committed && self.file.is_some() {
            let target = path::join(&self.target);
            log_warn!("staging buffer for {target} dropped without close; local changes discarded");
        }
    }
}

impl AsyncRead for LocalStaging {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(closed_error())),
        }
    }
}

impl AsyncWrite for LocalStaging {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        if this.read_only {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "staging stream is read-only",
            )));
        }
        match this.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(closed_error())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncSeek for LocalStaging {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).start_seek(position),
            None => Err(closed_error()),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_complete(cx),
            None => Poll::Ready(Err(closed_error())),
        }
    }
}
