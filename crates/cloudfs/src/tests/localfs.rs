use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::backend::{ByteStream, ObjectBackend};
use crate::config::FileStoreOptions;
use crate::error::Error;
use crate::localfs::LocalFsBackend;
use crate::provider::FileStore;
use crate::transfer;
use crate::update::UpdateMode;

fn local_store(dir: &tempfile::TempDir) -> FileStore {
    let backend: Arc<dyn ObjectBackend> = Arc::new(LocalFsBackend::new(dir.path()));
    FileStore::new(backend, FileStoreOptions::default())
}

#[tokio::test]
async fn test_update_creates_nested_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);

    store
        .update_file(
            "docs/report.txt",
            UpdateMode::Overwrite,
            ByteStream::from_bytes("quarterly"),
        )
        .await
        .unwrap();

    let on_disk = std::fs::read(dir.path().join("docs").join("report.txt")).unwrap();
    assert_eq!(on_disk, b"quarterly");

    let info = store.get_file_info("docs/report.txt").await.unwrap();
    assert!(info.exists);
    assert!(!info.is_directory);
    assert_eq!(info.size, 9);
}

#[tokio::test]
async fn test_directory_metadata_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    store
        .update_file("docs/a.txt", UpdateMode::Overwrite, ByteStream::from_bytes("1"))
        .await
        .unwrap();
    store
        .update_file("docs/sub/b.txt", UpdateMode::Overwrite, ByteStream::from_bytes("2"))
        .await
        .unwrap();

    let info = store.get_file_info("docs").await.unwrap();
    assert!(info.exists);
    assert!(info.is_directory);
    assert_eq!(info.size, -1);

    let contents = store.get_directory_contents("docs").await.unwrap();
    assert!(contents.exists);
    assert_eq!(contents.len(), 2);
    assert!(contents.iter().any(|e| !e.is_directory && e.name == "a.txt"));
    assert!(contents.iter().any(|e| e.is_directory && e.name == "sub"));

    let missing = store.get_directory_contents("nope").await.unwrap();
    assert!(!missing.exists);
}

#[tokio::test]
async fn test_native_append_extends_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);

    store
        .update_file("log.txt", UpdateMode::Overwrite, ByteStream::from_bytes("AAA"))
        .await
        .unwrap();
    store
        .update_file("log.txt", UpdateMode::Append, ByteStream::from_bytes("BBB"))
        .await
        .unwrap();

    assert_eq!(std::fs::read(dir.path().join("log.txt")).unwrap(), b"AAABBB");
    let info = store.get_file_info("log.txt").await.unwrap();
    assert_eq!(info.size, 6);
}

#[tokio::test]
async fn test_move_renames_atomically_into_new_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    store
        .update_file("docs/report.txt", UpdateMode::Overwrite, ByteStream::from_bytes("v1"))
        .await
        .unwrap();

    // Destination parents do not exist yet; the coordinator walks them
    // into existence before the rename.
    store
        .move_file("docs/report.txt", "archive/2024/report.txt")
        .await
        .unwrap();

    assert!(!dir.path().join("docs").join("report.txt").exists());
    let moved = std::fs::read(dir.path().join("archive").join("2024").join("report.txt")).unwrap();
    assert_eq!(moved, b"v1");
}

#[tokio::test]
async fn test_segment_occupied_by_file_is_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    store
        .update_file("blocker", UpdateMode::Overwrite, ByteStream::from_bytes("flat file"))
        .await
        .unwrap();
    store
        .update_file("src.txt", UpdateMode::Overwrite, ByteStream::from_bytes("x"))
        .await
        .unwrap();

    let err = store
        .move_file("src.txt", "blocker/sub/file.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    // Source untouched on conflict.
    assert!(store.get_file_info("src.txt").await.unwrap().exists);
}

#[tokio::test]
async fn test_ensure_directory_path_tolerates_existing_levels() {
    let dir = tempfile::tempdir().unwrap();
    let backend = LocalFsBackend::new(dir.path());
    std::fs::create_dir_all(dir.path().join("a").join("b")).unwrap();

    // "a" and "a/b" already exist (a concurrent creator, as far as the
    // walk can tell); only "a/b/c" is new.
    let segments: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    transfer::ensure_directory_path(&backend, &segments)
        .await
        .unwrap();
    assert!(dir.path().join("a").join("b").join("c").is_dir());

    // Running the walk again over fully existing levels is also fine.
    transfer::ensure_directory_path(&backend, &segments)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_recursive_delete_of_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    store
        .update_file("trash/a.txt", UpdateMode::Overwrite, ByteStream::from_bytes("1"))
        .await
        .unwrap();
    store
        .update_file("trash/deep/b.txt", UpdateMode::Overwrite, ByteStream::from_bytes("2"))
        .await
        .unwrap();

    assert!(store.delete("trash").await.unwrap());
    assert!(!dir.path().join("trash").exists());
    assert!(!store.delete("trash").await.unwrap());
}

#[tokio::test]
async fn test_staging_commits_through_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);

    let mut staging = store
        .create_local_staging("nested/new/file.txt", false)
        .await
        .unwrap();
    staging.write_all(b"staged bytes").await.unwrap();
    staging.close().await.unwrap();

    let written = std::fs::read(
        dir.path()
            .join("nested")
            .join("new")
            .join("file.txt"),
    )
    .unwrap();
    assert_eq!(written, b"staged bytes");
}

#[tokio::test]
async fn test_staging_a_directory_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    std::fs::create_dir(dir.path().join("somedir")).unwrap();

    let err = store.create_local_staging("somedir", false).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[tokio::test]
async fn test_append_to_directory_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    std::fs::create_dir(dir.path().join("somedir")).unwrap();

    let err = store
        .update_file("somedir", UpdateMode::Append, ByteStream::from_bytes("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[tokio::test]
async fn test_download_url_unsupported_on_local_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(&dir);
    let err = store
        .download_url("anything.txt", std::time::Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_root_prefix_on_local_disk() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn ObjectBackend> = Arc::new(LocalFsBackend::new(dir.path()));
    let store = FileStore::new(backend, FileStoreOptions::with_root("workspace"));

    store
        .update_file("f.txt", UpdateMode::Overwrite, ByteStream::from_bytes("rooted"))
        .await
        .unwrap();
    assert_eq!(
        std::fs::read(dir.path().join("workspace").join("f.txt")).unwrap(),
        b"rooted"
    );
    let info = store.get_file_info("f.txt").await.unwrap();
    assert_eq!(info.relative_segments, vec!["f.txt"]);
}
