//! The shared file/directory data model returned by every lookup and
//! listing. Entries are transient: recomputed on each call, never cached.

use chrono::{DateTime, Utc};

/// Sentinel used when a backend has no timestamp for an entry (synthetic
/// directories, missing objects).
pub fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// A file or directory as seen through the provider.
///
/// `size` is `-1` whenever the entry is a directory or the size is unknown;
/// the constructors below keep that invariant so callers can rely on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub exists: bool,
    pub is_directory: bool,
    pub size: i64,
    pub physical_path: String,
    pub name: String,
    pub last_modified: DateTime<Utc>,
    pub relative_segments: Vec<String>,
}

impl FileEntry {
    pub fn file(
        physical_path: impl Into<String>,
        name: impl Into<String>,
        size: i64,
        last_modified: DateTime<Utc>,
        relative_segments: Vec<String>,
    ) -> Self {
        FileEntry {
            exists: true,
            is_directory: false,
            size,
            physical_path: physical_path.into(),
            name: name.into(),
            last_modified,
            relative_segments,
        }
    }

    pub fn directory(
        physical_path: impl Into<String>,
        name: impl Into<String>,
        last_modified: DateTime<Utc>,
        relative_segments: Vec<String>,
    ) -> Self {
        FileEntry {
            exists: true,
            is_directory: true,
            size: -1,
            physical_path: physical_path.into(),
            name: name.into(),
            last_modified,
            relative_segments,
        }
    }

    /// Entry for a path with nothing behind it. Callers check `exists`
    /// rather than handling an error.
    pub fn missing(
        physical_path: impl Into<String>,
        name: impl Into<String>,
        relative_segments: Vec<String>,
    ) -> Self {
        FileEntry {
            exists: false,
            is_directory: false,
            size: -1,
            physical_path: physical_path.into(),
            name: name.into(),
            last_modified: epoch(),
            relative_segments,
        }
    }
}

/// Contents of one directory, in backend listing order. No sort is implied
/// or applied.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    pub exists: bool,
    pub entries: Vec<FileEntry>,
}

impl DirectoryListing {
    pub fn not_found() -> Self {
        DirectoryListing {
            exists: false,
            entries: Vec::new(),
        }
    }

    pub fn new(exists: bool, entries: Vec<FileEntry>) -> Self {
        DirectoryListing { exists, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for DirectoryListing {
    type Item = FileEntry;
    type IntoIter = std::vec::IntoIter<FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a DirectoryListing {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories_always_report_unknown_size() {
        let dir = FileEntry::directory("a/b", "b", epoch(), vec!["b".to_string()]);
        assert!(dir.is_directory);
        assert_eq!(dir.size, -1);

        let missing = FileEntry::missing("a/c", "c", vec!["c".to_string()]);
        assert!(!missing.exists);
        assert_eq!(missing.size, -1);
        assert_eq!(missing.last_modified, epoch());
    }
}
