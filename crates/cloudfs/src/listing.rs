//! Directory inference over flat object listings.
//!
//! Flat backends expose nothing but keys. A hierarchy is derived per call:
//! keys directly under the requested prefix become file entries, deeper
//! keys contribute synthetic directory names, and zero-byte marker objects
//! (keys ending in `/`) count as directories without ever becoming files.
//! Listings are paginated; every page must be consumed before the result
//! is final, because a directory name can first appear on a late page.

use diagnostics::log_debug;

use crate::backend::ObjectBackend;
use crate::config::FileStoreOptions;
use crate::entry::{epoch, FileEntry};
use crate::error::Result;
use crate::path;

fn listing_prefix(abs_segments: &[String]) -> String {
    if abs_segments.is_empty() {
        String::new()
    } else {
        path::dir_key(abs_segments)
    }
}

fn entry_for_key(options: &FileStoreOptions, object: &crate::backend::ObjectEntry) -> FileEntry {
    let segments = path::normalize(&object.key);
    FileEntry::file(
        object.key.clone(),
        path::base_name(&object.key),
        object.size as i64,
        object.last_modified,
        path::to_relative(&options.root_segments, &segments),
    )
}

/// Enumerates the directory at `abs_segments` on a flat backend.
///
/// Shallow mode emits file entries only for keys with no further
/// separator; deep mode emits every non-marker key. Both modes collect
/// synthetic directory names, deduplicated in first-seen order, appended
/// after all pages as `size = -1` entries with the epoch sentinel — unless
/// the name already has an explicit directory entry.
pub(crate) async fn enumerate_flat(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    abs_segments: &[String],
    deep: bool,
) -> Result<Vec<FileEntry>> {
    let prefix = listing_prefix(abs_segments);
    let mut entries: Vec<FileEntry> = Vec::new();
    let mut dir_names: Vec<String> = Vec::new();

    let mut token = None;
    let mut pages = 0usize;
    loop {
        let page = backend
            .list_objects(&prefix, token.take(), None)
            .await?;
        pages += 1;
        for object in &page.objects {
            let Some(rel) = object.key.strip_prefix(&prefix) else {
                continue;
            };
            if rel.is_empty() {
                // The listed directory's own marker object.
                continue;
            }
            match rel.find('/') {
                None => entries.push(entry_for_key(options, object)),
                Some(idx) => {
                    let dir_name = &rel[..idx];
                    if !dir_name.is_empty() && !dir_names.iter().any(|d| d == dir_name) {
                        dir_names.push(dir_name.to_string());
                    }
                    if deep && !rel.ends_with('/') {
                        entries.push(entry_for_key(options, object));
                    }
                }
            }
        }
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }

    for name in dir_names {
        if entries.iter().any(|e| e.is_directory && e.name == name) {
            continue;
        }
        let abs: Vec<String> = abs_segments
            .iter()
            .cloned()
            .chain(std::iter::once(name.clone()))
            .collect();
        entries.push(FileEntry::directory(
            format!("{prefix}{name}"),
            name,
            epoch(),
            path::to_relative(&options.root_segments, &abs),
        ));
    }
    log_debug!("flat enumeration of {prefix} finished in {pages} pages");

    Ok(entries)
}

/// Enumerates one directory level on a hierarchical backend, where the
/// adapter already reports real directories and no synthesis is needed.
pub(crate) async fn enumerate_hierarchical(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    abs_segments: &[String],
) -> Result<Vec<FileEntry>> {
    let prefix = listing_prefix(abs_segments);
    let mut entries = Vec::new();
    let mut token = None;
    loop {
        let page = backend.list_objects(&prefix, token.take(), None).await?;
        for object in &page.objects {
            let segments = path::normalize(&object.key);
            let relative = path::to_relative(&options.root_segments, &segments);
            if object.is_directory {
                entries.push(FileEntry::directory(
                    object.key.clone(),
                    path::base_name(&object.key),
                    object.last_modified,
                    relative,
                ));
            } else {
                entries.push(entry_for_key(options, object));
            }
        }
        token = page.next_token;
        if token.is_none() {
            break;
        }
    }
    Ok(entries)
}

/// Resolves a single path on a flat backend with a bounded two-key probe.
///
/// Zero matches is a miss; one key equal to the path is a file; anything
/// else — several matches, or one that merely extends the prefix — falls
/// to the backend's declared [`PrefixMatchPolicy`].
pub(crate) async fn probe_flat(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    abs_segments: &[String],
) -> Result<FileEntry> {
    use crate::backend::PrefixMatchPolicy;

    let key = path::join(abs_segments);
    let relative = path::to_relative(&options.root_segments, abs_segments);
    let name = abs_segments.last().cloned().unwrap_or_default();
    if key.is_empty() {
        // The container root always exists as a directory.
        return Ok(FileEntry::directory(key, name, epoch(), relative));
    }

    let page = backend.list_objects(&key, None, Some(2)).await?;
    if page.objects.is_empty() {
        return Ok(FileEntry::missing(key, name, relative));
    }
    if page.objects.len() == 1 && page.objects[0].key == key {
        let object = &page.objects[0];
        return Ok(FileEntry::file(
            object.key.clone(),
            name,
            object.size as i64,
            object.last_modified,
            relative,
        ));
    }
    match backend.capabilities().prefix_match_policy {
        PrefixMatchPolicy::TreatAsDirectory => {
            Ok(FileEntry::directory(key, name, epoch(), relative))
        }
        PrefixMatchPolicy::TreatAsMissing => Ok(FileEntry::missing(key, name, relative)),
    }
}

/// Resolves a single path on a hierarchical backend from object metadata.
pub(crate) async fn probe_hierarchical(
    backend: &dyn ObjectBackend,
    options: &FileStoreOptions,
    abs_segments: &[String],
) -> Result<FileEntry> {
    let key = path::join(abs_segments);
    let relative = path::to_relative(&options.root_segments, abs_segments);
    let name = abs_segments.last().cloned().unwrap_or_default();
    match backend.object_metadata(&key).await? {
        None => Ok(FileEntry::missing(key, name, relative)),
        Some(meta) if meta.is_directory => Ok(FileEntry::directory(
            key,
            name,
            meta.last_modified,
            relative,
        )),
        Some(meta) => Ok(FileEntry::file(
            key,
            name,
            meta.size as i64,
            meta.last_modified,
            relative,
        )),
    }
}
