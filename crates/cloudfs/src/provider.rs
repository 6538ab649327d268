//! The upward-facing file API.
//!
//! `FileStore` is what applications hold: every call takes a subpath (or
//! segment list), resolves it under the configured root, and drives the
//! backend primitives. Nothing is cached between calls — every lookup and
//! listing reflects the backend at the moment it ran.

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use diagnostics::{log_debug, log_info};
use tokio::io::AsyncSeekExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::{ByteStream, Capabilities, ChangeToken, ObjectBackend};
use crate::config::FileStoreOptions;
use crate::entry::{DirectoryListing, FileEntry};
use crate::error::{Error, Result};
use crate::listing;
use crate::path::{self, Subpath};
use crate::staging::LocalStaging;
use crate::transfer;
use crate::update::{self, UpdateMode};

/// A file provider over one backend adapter. Cheap to clone; clones share
/// the adapter, options and cancellation token.
#[derive(Clone)]
pub struct FileStore {
    backend: Arc<dyn ObjectBackend>,
    options: Arc<FileStoreOptions>,
    cancel: CancellationToken,
}

impl FileStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, options: FileStoreOptions) -> Self {
        diagnostics::init_diagnostics();
        FileStore {
            backend,
            options: Arc::new(options),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the cancellation token observed by long-running loops
    /// (copy-status polling, spill copies).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &FileStoreOptions {
        &self.options
    }

    pub fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn absolute(&self, path: impl Into<Subpath>) -> Vec<String> {
        path::to_absolute(&self.options.root_segments, path.into().segments())
    }

    /// The one sanctioned retry: an operation that failed because the
    /// container is missing gets the container created and one replay.
    async fn with_container_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Err(Error::ContainerNotFound(name)) => {
                log_debug!("container {name} missing, creating and retrying once");
                self.backend.create_container_if_missing().await?;
                op().await
            }
            other => other,
        }
    }

    /// Resolves a single path. A missing object comes back with
    /// `exists = false` rather than an error.
    pub async fn get_file_info(&self, path: impl Into<Subpath>) -> Result<FileEntry> {
        let abs = self.absolute(path);
        let backend = &*self.backend;
        let options = &*self.options;
        if backend.capabilities().hierarchical {
            self.with_container_retry(|| listing::probe_hierarchical(backend, options, &abs))
                .await
        } else {
            self.with_container_retry(|| listing::probe_flat(backend, options, &abs))
                .await
        }
    }

    /// Lists one directory level. On flat backends the hierarchy is
    /// inferred from key prefixes; `exists` reflects whether anything
    /// lives under the path.
    pub async fn get_directory_contents(
        &self,
        path: impl Into<Subpath>,
    ) -> Result<DirectoryListing> {
        let abs = self.absolute(path);
        let backend = &*self.backend;
        let options = &*self.options;
        if backend.capabilities().hierarchical {
            let probe = listing::probe_hierarchical(backend, options, &abs).await?;
            if !abs.is_empty() && (!probe.exists || !probe.is_directory) {
                return Ok(DirectoryListing::not_found());
            }
            let entries = self
                .with_container_retry(|| listing::enumerate_hierarchical(backend, options, &abs))
                .await?;
            Ok(DirectoryListing::new(true, entries))
        } else {
            let entries = self
                .with_container_retry(|| listing::enumerate_flat(backend, options, &abs, false))
                .await?;
            Ok(DirectoryListing::new(!entries.is_empty(), entries))
        }
    }

    /// Opens the object for reading. Missing objects are an error here —
    /// callers who need to probe first use `get_file_info`.
    pub async fn read_file(&self, path: impl Into<Subpath>) -> Result<ByteStream> {
        let abs = self.absolute(path);
        let key = path::join(&abs);
        self.with_container_retry(|| self.backend.object_reader(&key))
            .await
    }

    /// Writes `content` to the object in the given mode. Append works on
    /// every backend: natively where supported, otherwise emulated as one
    /// concatenated overwrite.
    pub async fn update_file(
        &self,
        path: impl Into<Subpath>,
        mode: UpdateMode,
        content: ByteStream,
    ) -> Result<()> {
        let abs = self.absolute(path);
        self.update_absolute(&abs, mode, content).await
    }

    pub(crate) async fn update_absolute(
        &self,
        abs: &[String],
        mode: UpdateMode,
        content: ByteStream,
    ) -> Result<()> {
        // Write payloads cannot be replayed, so the container check runs
        // up front instead of the catch-and-retry used on read paths.
        self.backend.create_container_if_missing().await?;
        update::apply(
            &*self.backend,
            &self.options,
            &self.cancel,
            abs,
            mode,
            content,
        )
        .await?;
        let key = path::join(abs);
        log_info!("updated {key}");
        Ok(())
    }

    /// Deletes a file, or a directory recursively. Returns whether
    /// anything was actually removed.
    pub async fn delete(&self, path: impl Into<Subpath>) -> Result<bool> {
        let abs = self.absolute(path);
        self.with_container_retry(|| self.delete_absolute(&abs)).await
    }

    async fn delete_absolute(&self, abs: &[String]) -> Result<bool> {
        let backend = &*self.backend;
        let options = &*self.options;
        let key = path::join(abs);

        if backend.capabilities().hierarchical {
            return match backend.object_metadata(&key).await? {
                // Adapters delete directories recursively.
                Some(_) => {
                    backend.delete_object(&key).await?;
                    Ok(true)
                }
                None => Ok(false),
            };
        }

        let info = listing::probe_flat(backend, options, abs).await?;
        if info.exists && !info.is_directory {
            backend.delete_object(&key).await?;
            return Ok(true);
        }
        // Directory (or unresolved prefix): collect every key underneath
        // and delete the batch.
        let keys: Vec<String> = listing::enumerate_flat(backend, options, abs, true)
            .await?
            .into_iter()
            .filter(|e| !e.is_directory)
            .map(|e| e.physical_path)
            .collect();
        if keys.is_empty() {
            return Ok(false);
        }
        backend.delete_objects(&keys).await?;
        log_info!("deleted {key} recursively");
        Ok(true)
    }

    /// Moves/renames a file. One atomic call where the backend has it;
    /// otherwise copy, poll to terminal state, then delete the source.
    pub async fn move_file(
        &self,
        old: impl Into<Subpath>,
        new: impl Into<Subpath>,
    ) -> Result<()> {
        let old_abs = self.absolute(old);
        let new_abs = self.absolute(new);
        self.with_container_retry(|| {
            transfer::move_object(
                &*self.backend,
                &self.options,
                &self.cancel,
                &old_abs,
                &new_abs,
            )
        })
        .await
    }

    /// Issues a time-bounded, read-only direct-access URL. Typed
    /// `Unsupported` where the backend cannot presign.
    pub async fn download_url(
        &self,
        path: impl Into<Subpath>,
        validity: Duration,
    ) -> Result<Url> {
        if !self.backend.capabilities().supports_presigned_url {
            return Err(Error::unsupported("download_url", self.backend.name()));
        }
        let abs = self.absolute(path);
        let key = path::join(&abs);
        self.with_container_retry(|| self.backend.presign_url(&key, validity))
            .await
    }

    /// Change notification, where the backend has a feed for it.
    pub async fn watch(&self, filter: &str) -> Result<ChangeToken> {
        if !self.backend.capabilities().supports_watch {
            return Err(Error::unsupported("watch", self.backend.name()));
        }
        self.backend.watch(filter).await
    }

    /// Stages the object as a local read/write buffer. The buffer starts
    /// as a copy of the remote content, or empty when the object does not
    /// exist yet; closing a write-intent buffer commits it back exactly
    /// once (see [`LocalStaging`]).
    pub async fn create_local_staging(
        &self,
        path: impl Into<Subpath>,
        read_only: bool,
    ) -> Result<LocalStaging> {
        let abs = self.absolute(path);
        let key = path::join(&abs);

        let std_file = tempfile::tempfile()?;
        let mut file = tokio::fs::File::from_std(std_file);
        // Any failure past this point drops `file`, and with it the unlinked
        // temp resource — no exit path leaks the handle.
        let meta = self
            .with_container_retry(|| self.backend.object_metadata(&key))
            .await?;
        match meta {
            Some(meta) if meta.is_directory => {
                return Err(Error::conflict(key, "cannot stage a directory"));
            }
            Some(_) => {
                let mut reader = self.backend.object_reader(&key).await?.into_reader();
                update::copy_cancellable(&mut reader, &mut file, &self.cancel).await?;
                file.seek(SeekFrom::Start(0)).await?;
                log_debug!("staged {key} to local buffer");
            }
            // Creation path: the buffer starts empty.
            None => {}
        }
        Ok(LocalStaging::new(file, self.clone(), abs, read_only))
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("backend", &self.backend.name())
            .field("root", &self.options.root_path())
            .finish()
    }
}
