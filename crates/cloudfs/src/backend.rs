//! The primitive contract every storage adapter implements.
//!
//! The core never talks to a network SDK directly; it drives these
//! primitives and assembles file semantics on top. Optional operations are
//! default methods that report a typed [`Error::Unsupported`] at the point
//! of call, so an adapter declares a capability by overriding the method
//! and setting the matching flag.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::watch;
use url::Url;

use crate::error::{Error, Result};

/// How a flat backend resolves a single-path probe that matches multiple
/// keys, or one key that merely shares the prefix. Declared, never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixMatchPolicy {
    /// Report the path as an existing directory.
    #[default]
    TreatAsDirectory,
    /// Report the path as missing.
    TreatAsMissing,
}

/// Capability flags for one adapter instance. Absence of a capability is a
/// legal state, not an error; the core routes around it or surfaces
/// `Unsupported`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub supports_native_append: bool,
    pub supports_atomic_rename: bool,
    pub supports_presigned_url: bool,
    pub supports_watch: bool,
    pub supports_copy_status: bool,
    pub supports_lease: bool,
    /// True when the namespace has real directories (local disk, document
    /// stores). False means flat keys and inferred hierarchy.
    pub hierarchical: bool,
    pub prefix_match_policy: PrefixMatchPolicy,
}

/// Metadata for one object, as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Only hierarchical backends ever set this; flat listings report
    /// directories as key prefixes instead.
    pub is_directory: bool,
}

/// One listed object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub is_directory: bool,
}

/// One page of a listing plus the cursor for the next one. A listing is
/// complete only when `next_token` comes back `None`.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectEntry>,
    pub next_token: Option<String>,
}

/// Server-side copy progress.
#[derive(Debug, Clone, PartialEq)]
pub enum CopyState {
    Pending,
    Success,
    Failed(String),
    Aborted(String),
}

impl CopyState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CopyState::Pending)
    }
}

/// An exclusive lease held on an object during a multi-step operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub id: String,
}

/// Byte payload moving in or out of a backend: a boxed async reader plus
/// the declared length, when the producer knows it. Consumers that size
/// buffers treat an unknown length as large.
pub struct ByteStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    length: Option<u64>,
}

impl ByteStream {
    pub fn new(reader: impl AsyncRead + Send + 'static, length: Option<u64>) -> Self {
        ByteStream {
            reader: Box::pin(reader),
            length,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len() as u64;
        ByteStream {
            reader: Box::pin(std::io::Cursor::new(bytes)),
            length: Some(length),
        }
    }

    /// Wraps an open file positioned at the intended start. The declared
    /// length is the remaining span of the file.
    pub async fn from_file(mut file: tokio::fs::File) -> Result<Self> {
        use tokio::io::AsyncSeekExt;
        let pos = file.stream_position().await?;
        let len = file.metadata().await?.len();
        Ok(ByteStream {
            reader: Box::pin(file),
            length: Some(len.saturating_sub(pos)),
        })
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.reader
    }

    /// Drains the stream into memory. Used by tests and by the in-memory
    /// append path; large payloads take the spill route instead.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut buf = match self.length {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl AsyncRead for ByteStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Handed out by `watch` on backends that can signal changes. Wraps a
/// watch channel; adapters that support change feeds push through a
/// [`ChangeSource`].
#[derive(Debug, Clone)]
pub struct ChangeToken {
    rx: watch::Receiver<u64>,
}

impl ChangeToken {
    /// True once a change has been signalled since the token was issued
    /// or last awaited.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next change. Returns `false` if the source went away.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Producer half of a change feed.
#[derive(Debug)]
pub struct ChangeSource {
    tx: watch::Sender<u64>,
}

impl ChangeSource {
    pub fn notify(&self) {
        self.tx.send_modify(|v| *v += 1);
    }

    pub fn token(&self) -> ChangeToken {
        ChangeToken {
            rx: self.tx.subscribe(),
        }
    }
}

pub fn change_channel() -> (ChangeSource, ChangeToken) {
    let (tx, rx) = watch::channel(0);
    (ChangeSource { tx }, ChangeToken { rx })
}

/// The fixed primitive interface the core drives.
///
/// Required methods cover list/get/put/delete/copy; everything else is
/// optional and capability-gated. `object_metadata` reports a missing
/// object as `Ok(None)` — absence is data on that path, not an error.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Short adapter name used in diagnostics and `Unsupported` errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// One page of keys under `prefix`. Pass the token from the previous
    /// page to continue; `max_keys` bounds the page where the caller only
    /// needs a probe.
    async fn list_objects(
        &self,
        prefix: &str,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage>;

    async fn object_metadata(&self, key: &str) -> Result<Option<ObjectMeta>>;

    async fn object_reader(&self, key: &str) -> Result<ByteStream>;

    async fn put_object(&self, key: &str, content: ByteStream) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete_object(key).await?;
        }
        Ok(())
    }

    async fn copy_object(&self, src: &str, dest: &str) -> Result<()>;

    /// Progress of the copy targeting `key`. Only meaningful on backends
    /// whose `copy_object` is asynchronous server-side.
    async fn copy_status(&self, _key: &str) -> Result<CopyState> {
        Err(Error::unsupported("copy_status", self.name()))
    }

    /// Native append, extending the object (creating it when absent).
    async fn append_object(&self, _key: &str, _content: ByteStream) -> Result<()> {
        Err(Error::unsupported("append_object", self.name()))
    }

    /// Single-call atomic rename / parent-reference update.
    async fn rename_object(&self, _src: &str, _dest: &str) -> Result<()> {
        Err(Error::unsupported("rename_object", self.name()))
    }

    /// Time-bounded read-only URL retrievable without further auth.
    async fn presign_url(&self, _key: &str, _validity: Duration) -> Result<Url> {
        Err(Error::unsupported("presign_url", self.name()))
    }

    async fn acquire_lease(&self, _key: &str) -> Result<Lease> {
        Err(Error::unsupported("acquire_lease", self.name()))
    }

    async fn release_lease(&self, _key: &str, _lease: &Lease) -> Result<()> {
        Err(Error::unsupported("release_lease", self.name()))
    }

    /// Creates one directory level on hierarchical backends. Reports
    /// `AlreadyExists` when the segment is already there; the caller
    /// treats that as success.
    async fn make_directory(&self, _key: &str) -> Result<()> {
        Err(Error::unsupported("make_directory", self.name()))
    }

    /// Idempotent container/bucket creation, used by the one documented
    /// retry pattern. Adapters without a container concept keep the no-op.
    async fn create_container_if_missing(&self) -> Result<()> {
        Ok(())
    }

    async fn watch(&self, _filter: &str) -> Result<ChangeToken> {
        Err(Error::unsupported("watch", self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_byte_stream_from_bytes_declares_length() {
        let stream = ByteStream::from_bytes("hello");
        assert_eq!(stream.length(), Some(5));
        assert_eq!(stream.read_to_end().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_byte_stream_unknown_length() {
        let stream = ByteStream::new(std::io::Cursor::new(vec![1u8, 2, 3]), None);
        assert_eq!(stream.length(), None);
        assert_eq!(stream.read_to_end().await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_copy_state_terminality() {
        assert!(!CopyState::Pending.is_terminal());
        assert!(CopyState::Success.is_terminal());
        assert!(CopyState::Failed("x".into()).is_terminal());
        assert!(CopyState::Aborted("x".into()).is_terminal());
    }

    #[tokio::test]
    async fn test_change_channel_signals_subscribers() {
        let (source, token) = change_channel();
        assert!(!token.has_changed());
        source.notify();
        assert!(token.has_changed());

        let mut late = source.token();
        assert!(!late.has_changed());
        source.notify();
        assert!(late.changed().await);
    }
}
