//! Synchronous entry points.
//!
//! Wraps a [`FileStore`] so non-async callers can use it. The wrapper
//! owns a dedicated current-thread runtime and blocks the calling thread
//! until each operation completes. It must never be used from inside an
//! async context: nesting `block_on` inside a runtime panics (by design —
//! on a single-threaded executor it would deadlock instead).

use std::time::Duration;

use tokio::io::AsyncReadExt;
use url::Url;

use crate::backend::ByteStream;
use crate::entry::{DirectoryListing, FileEntry};
use crate::error::Result;
use crate::path::Subpath;
use crate::provider::FileStore;
use crate::update::UpdateMode;

pub struct BlockingFileStore {
    store: FileStore,
    runtime: tokio::runtime::Runtime,
}

impl BlockingFileStore {
    pub fn new(store: FileStore) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BlockingFileStore { store, runtime })
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn get_file_info(&self, path: impl Into<Subpath>) -> Result<FileEntry> {
        self.runtime.block_on(self.store.get_file_info(path))
    }

    pub fn get_directory_contents(&self, path: impl Into<Subpath>) -> Result<DirectoryListing> {
        self.runtime
            .block_on(self.store.get_directory_contents(path))
    }

    /// Reads the whole object into memory. Callers streaming large
    /// objects should use the async surface instead.
    pub fn read_file(&self, path: impl Into<Subpath>) -> Result<Vec<u8>> {
        self.runtime.block_on(async {
            let mut reader = self.store.read_file(path).await?.into_reader();
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            Ok(buf)
        })
    }

    pub fn update_file(
        &self,
        path: impl Into<Subpath>,
        mode: UpdateMode,
        content: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let content = ByteStream::from_bytes(content.into());
        self.runtime
            .block_on(self.store.update_file(path, mode, content))
    }

    pub fn delete(&self, path: impl Into<Subpath>) -> Result<bool> {
        self.runtime.block_on(self.store.delete(path))
    }

    pub fn move_file(&self, old: impl Into<Subpath>, new: impl Into<Subpath>) -> Result<()> {
        self.runtime.block_on(self.store.move_file(old, new))
    }

    pub fn download_url(&self, path: impl Into<Subpath>, validity: Duration) -> Result<Url> {
        self.runtime.block_on(self.store.download_url(path, validity))
    }
}

impl std::fmt::Debug for BlockingFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingFileStore")
            .field("store", &self.store)
            .finish()
    }
}
