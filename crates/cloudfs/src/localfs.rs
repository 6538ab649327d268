//! Local-disk adapter.
//!
//! Hierarchical: directories are real, rename is atomic, append is
//! native. Keys map straight onto paths under the configured base
//! directory; the empty key is the base itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::backend::{
    ByteStream, Capabilities, ObjectBackend, ObjectEntry, ObjectMeta, ObjectPage,
};
use crate::error::{Error, Result};

pub struct LocalFsBackend {
    base: PathBuf,
}

impl LocalFsBackend {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        LocalFsBackend { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn fs_path(&self, key: &str) -> PathBuf {
        let mut path = self.base.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn meta_from_std(meta: &std::fs::Metadata) -> ObjectMeta {
    let last_modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| crate::entry::epoch());
    ObjectMeta {
        size: if meta.is_dir() { 0 } else { meta.len() },
        last_modified,
        is_directory: meta.is_dir(),
    }
}

async fn metadata_opt(path: &Path) -> Result<Option<std::fs::Metadata>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    fn name(&self) -> &'static str {
        "localfs"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_native_append: true,
            supports_atomic_rename: true,
            hierarchical: true,
            ..Capabilities::default()
        }
    }

    /// Immediate children of the directory named by `prefix` (which the
    /// core passes with a trailing separator, or empty for the base).
    async fn list_objects(
        &self,
        prefix: &str,
        _token: Option<String>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage> {
        let dir = self.fs_path(prefix);
        let mut entries = Vec::new();
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ObjectPage::default());
            }
            Err(err) => return Err(err.into()),
        };
        while let Some(dirent) = reader.next_entry().await? {
            let name = dirent.file_name().to_string_lossy().to_string();
            let meta = dirent.metadata().await?;
            entries.push(ObjectEntry {
                key: format!("{prefix}{name}"),
                size: if meta.is_dir() { 0 } else { meta.len() },
                last_modified: meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| crate::entry::epoch()),
                is_directory: meta.is_dir(),
            });
            if let Some(max) = max_keys {
                if entries.len() >= max {
                    break;
                }
            }
        }
        Ok(ObjectPage {
            objects: entries,
            next_token: None,
        })
    }

    async fn object_metadata(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let path = self.fs_path(key);
        Ok(metadata_opt(&path).await?.map(|m| meta_from_std(&m)))
    }

    async fn object_reader(&self, key: &str) -> Result<ByteStream> {
        let path = self.fs_path(key);
        match tokio::fs::File::open(&path).await {
            Ok(file) => ByteStream::from_file(file).await,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(key))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put_object(&self, key: &str, content: ByteStream) -> Result<()> {
        let path = self.fs_path(key);
        self.ensure_parent(&path).await?;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut reader = content.into_reader();
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.fs_path(key);
        match metadata_opt(&path).await? {
            Some(meta) if meta.is_dir() => Ok(tokio::fs::remove_dir_all(&path).await?),
            Some(_) => Ok(tokio::fs::remove_file(&path).await?),
            None => Ok(()),
        }
    }

    async fn copy_object(&self, src: &str, dest: &str) -> Result<()> {
        let from = self.fs_path(src);
        let to = self.fs_path(dest);
        self.ensure_parent(&to).await?;
        match tokio::fs::copy(&from, &to).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(src))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn append_object(&self, key: &str, content: ByteStream) -> Result<()> {
        let path = self.fs_path(key);
        self.ensure_parent(&path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut reader = content.into_reader();
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn rename_object(&self, src: &str, dest: &str) -> Result<()> {
        let from = self.fs_path(src);
        let to = self.fs_path(dest);
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(src))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn make_directory(&self, key: &str) -> Result<()> {
        let path = self.fs_path(key);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::already_exists(key))
            }
            Err(err) => Err(err.into()),
        }
    }
}
