//! Path-segment handling.
//!
//! Every public entry point accepts either a subpath string or a segment
//! list; internally everything is a `Vec<String>` of non-empty segments
//! with no embedded separators. Absolute paths are a view: the configured
//! root segments prepended to the relative ones.

/// Marker a caller may use to pin a path to the filesystem root on
/// platforms where the leading separator would otherwise be lost in
/// segment form. Stripped during normalization.
const ROOT_MARKER: &str = "root:";

/// Splits a raw subpath into segments. Backslashes are treated as
/// separators, empty components are dropped, and a leading root escape
/// marker is stripped.
pub fn normalize(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let unified = raw.replace('\\', "/");
    let trimmed = unified.strip_prefix(ROOT_MARKER).unwrap_or(&unified);
    trimmed
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Joins segments with `/`. The inverse of `normalize` up to separator
/// canonicalization: `normalize(&join(&normalize(p))) == normalize(p)`.
pub fn join(segments: &[String]) -> String {
    segments.join("/")
}

/// Key form of a directory path: the joined segments plus a trailing `/`.
pub fn dir_key(segments: &[String]) -> String {
    format!("{}/", join(segments))
}

/// Prefixes relative segments with the configured root segments.
pub fn to_absolute(root: &[String], relative: &[String]) -> Vec<String> {
    root.iter().chain(relative.iter()).cloned().collect()
}

/// Drops the configured root prefix. If `absolute` does not actually start
/// with the prefix it is returned unchanged rather than erroring; callers
/// hold paths from mixed sources and a foreign path is not a fault.
pub fn to_relative(root: &[String], absolute: &[String]) -> Vec<String> {
    if absolute.len() >= root.len() && absolute[..root.len()] == *root {
        absolute[root.len()..].to_vec()
    } else {
        absolute.to_vec()
    }
}

/// Final segment of a key, ignoring a trailing separator.
pub fn base_name(key: &str) -> String {
    let trimmed = key.strip_suffix('/').unwrap_or(key);
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// A normalized path argument. Built from subpath strings or segment
/// collections so the public surface can take `impl Into<Subpath>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subpath(pub Vec<String>);

impl Subpath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Subpath {
    fn from(raw: &str) -> Self {
        Subpath(normalize(raw))
    }
}

impl From<String> for Subpath {
    fn from(raw: String) -> Self {
        Subpath(normalize(&raw))
    }
}

impl From<Vec<String>> for Subpath {
    fn from(segments: Vec<String>) -> Self {
        // Segment lists may still carry separators or empties from callers
        // that assembled them by hand; renormalize through the joined form.
        Subpath(normalize(&segments.join("/")))
    }
}

impl From<&[&str]> for Subpath {
    fn from(segments: &[&str]) -> Self {
        Subpath(normalize(&segments.join("/")))
    }
}

impl<const N: usize> From<[&str; N]> for Subpath {
    fn from(segments: [&str; N]) -> Self {
        Subpath(normalize(&segments.join("/")))
    }
}
