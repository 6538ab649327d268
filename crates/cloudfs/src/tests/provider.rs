use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncReadExt;

use super::{default_memory_store, memory_store};
use crate::backend::{ByteStream, ObjectBackend};
use crate::blocking::BlockingFileStore;
use crate::config::FileStoreOptions;
use crate::memory::MemoryBackend;
use crate::provider::FileStore;
use crate::update::UpdateMode;

#[tokio::test]
async fn test_missing_container_is_created_and_retried_once() {
    let (backend, store) = memory_store(
        MemoryBackend::new().without_container(),
        FileStoreOptions::default(),
    );

    // The probe fails with ContainerNotFound, the container is created,
    // and the retried probe reports a clean miss instead of an error.
    let info = store.get_file_info("first.txt").await.unwrap();
    assert!(!info.exists);

    // The container now exists for real operations.
    store
        .update_file("first.txt", UpdateMode::Overwrite, ByteStream::from_bytes("x"))
        .await
        .unwrap();
    assert_eq!(backend.object("first.txt").await.unwrap(), b"x");
}

#[tokio::test]
async fn test_read_file_roundtrip() {
    let (backend, store) = default_memory_store();
    backend.insert_object("r.txt", "readable").await;

    let mut reader = store.read_file("r.txt").await.unwrap().into_reader();
    let mut buf = String::new();
    reader.read_to_string(&mut buf).await.unwrap();
    assert_eq!(buf, "readable");
}

#[tokio::test]
async fn test_read_missing_file_is_an_error() {
    let (_backend, store) = default_memory_store();
    let err = store.read_file("absent.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_file_returns_true_once() {
    let (backend, store) = default_memory_store();
    backend.insert_object("d.txt", "bye").await;

    assert!(store.delete("d.txt").await.unwrap());
    assert!(backend.object("d.txt").await.is_none());
    assert!(!store.delete("d.txt").await.unwrap());
}

#[tokio::test]
async fn test_delete_directory_removes_every_key() {
    let (backend, store) = default_memory_store();
    backend.insert_object("dir/a.txt", "1").await;
    backend.insert_object("dir/sub/b.txt", "2").await;
    backend.insert_object("other.txt", "keep").await;

    assert!(store.delete("dir").await.unwrap());
    assert_eq!(backend.keys().await, vec!["other.txt"]);
}

#[tokio::test]
async fn test_delete_missing_path_returns_false() {
    let (_backend, store) = default_memory_store();
    assert!(!store.delete("nothing/here").await.unwrap());
}

#[tokio::test]
async fn test_download_url_carries_validity() {
    let (backend, store) = default_memory_store();
    backend.insert_object("shared.txt", "public").await;

    let validity = Duration::from_secs(3600);
    let before = Utc::now();
    let url = store.download_url("shared.txt", validity).await.unwrap();

    assert_eq!(url.scheme(), "memory");
    let expires_at: i64 = url
        .query_pairs()
        .find(|(k, _)| k == "expires_at")
        .map(|(_, v)| v.parse().unwrap())
        .expect("expires_at in url");
    // Valid for at least the requested window from issuance.
    assert!(expires_at >= (before + chrono::Duration::seconds(3600)).timestamp());
}

#[tokio::test]
async fn test_watch_is_typed_unsupported() {
    let (_backend, store) = default_memory_store();
    let err = store.watch("**/*.txt").await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_distinct_paths_run_concurrently() {
    let (backend, store) = default_memory_store();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("file-{i}.txt");
            store
                .update_file(
                    name.as_str(),
                    UpdateMode::Overwrite,
                    ByteStream::from_bytes(format!("payload {i}")),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(backend.keys().await.len(), 16);
}

#[test]
fn test_blocking_facade_roundtrip() {
    // Built outside any runtime, exactly how a synchronous caller would.
    let backend = Arc::new(MemoryBackend::new());
    let as_backend: Arc<dyn ObjectBackend> = backend.clone();
    let store = FileStore::new(as_backend, FileStoreOptions::default());
    let blocking = BlockingFileStore::new(store).unwrap();

    blocking
        .update_file("sync.txt", UpdateMode::Overwrite, &b"from sync land"[..])
        .unwrap();
    assert_eq!(blocking.read_file("sync.txt").unwrap(), b"from sync land");

    let info = blocking.get_file_info("sync.txt").unwrap();
    assert!(info.exists);
    assert_eq!(info.size, 14);

    blocking.move_file("sync.txt", "moved.txt").unwrap();
    let listing = blocking.get_directory_contents("").unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing.entries[0].name, "moved.txt");

    assert!(blocking.delete("moved.txt").unwrap());
    assert!(!blocking.get_file_info("moved.txt").unwrap().exists);
}
