use std::sync::Arc;

use crate::backend::ObjectBackend;
use crate::config::FileStoreOptions;
use crate::memory::MemoryBackend;
use crate::provider::FileStore;

mod localfs;
mod provider;

/// A store over a shared memory backend, so tests can both drive the
/// public surface and inspect the raw object map.
pub(crate) fn memory_store(
    backend: MemoryBackend,
    options: FileStoreOptions,
) -> (Arc<MemoryBackend>, FileStore) {
    let backend = Arc::new(backend);
    let as_backend: Arc<dyn ObjectBackend> = backend.clone();
    (backend, FileStore::new(as_backend, options))
}

pub(crate) fn default_memory_store() -> (Arc<MemoryBackend>, FileStore) {
    memory_store(MemoryBackend::new(), FileStoreOptions::default())
}
