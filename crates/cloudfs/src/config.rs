//! Provider configuration shared by every adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::path;

/// Options for one provider instance. Loading these from wherever an
/// application keeps them is the caller's business; the struct only has to
/// round-trip through serde and carry sane defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreOptions {
    /// Segments every caller-supplied path is resolved under. Empty means
    /// the container root.
    pub root_segments: Vec<String>,

    /// Byte size at which an emulated append concatenation moves from an
    /// in-memory buffer to a spill file. Tuned per backend; 20 MiB matches
    /// the guideline the document-store backends use.
    pub spill_threshold: u64,

    /// Fixed sleep between copy-status polls during a non-atomic move.
    #[serde(with = "duration_millis")]
    pub copy_poll_interval: Duration,

    /// Upper bound on the whole copy-status poll. Exceeding it raises
    /// `ConsistencyTimeout` instead of looping forever.
    #[serde(with = "duration_millis")]
    pub copy_poll_timeout: Duration,
}

pub const DEFAULT_SPILL_THRESHOLD: u64 = 20 * 1024 * 1024;

impl Default for FileStoreOptions {
    fn default() -> Self {
        FileStoreOptions {
            root_segments: Vec::new(),
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            copy_poll_interval: Duration::from_secs(1),
            copy_poll_timeout: Duration::from_secs(300),
        }
    }
}

impl FileStoreOptions {
    /// Options rooted at `root`, which may be a subpath string in any
    /// separator convention.
    pub fn with_root(root: &str) -> Self {
        let mut options = FileStoreOptions::default();
        options.set_root_path(root);
        options
    }

    pub fn set_root_path(&mut self, raw: &str) {
        self.root_segments = path::normalize(raw);
    }

    /// The root as a display path: empty for the container root, otherwise
    /// the joined segments with a trailing separator.
    pub fn root_path(&self) -> String {
        if self.root_segments.is_empty() {
            String::new()
        } else {
            format!("{}/", path::join(&self.root_segments))
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = FileStoreOptions::default();
        assert!(options.root_segments.is_empty());
        assert_eq!(options.spill_threshold, DEFAULT_SPILL_THRESHOLD);
        assert_eq!(options.copy_poll_interval, Duration::from_secs(1));
        assert_eq!(options.root_path(), "");
    }

    #[test]
    fn test_root_path_normalizes() {
        let options = FileStoreOptions::with_root("/tenants\\acme/");
        assert_eq!(options.root_segments, vec!["tenants", "acme"]);
        assert_eq!(options.root_path(), "tenants/acme/");
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut options = FileStoreOptions::with_root("data");
        options.spill_threshold = 4;
        options.copy_poll_interval = Duration::from_millis(10);
        let json = serde_json::to_string(&options).unwrap();
        let back: FileStoreOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root_segments, options.root_segments);
        assert_eq!(back.spill_threshold, 4);
        assert_eq!(back.copy_poll_interval, Duration::from_millis(10));
    }
}
