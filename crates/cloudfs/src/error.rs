use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by storage operations.
///
/// `NotFound` is recovered on the info paths (callers see `exists = false`)
/// and only raised where a missing object makes the operation impossible,
/// such as reading. `Unsupported` is always explicit: an adapter that lacks
/// a capability reports it at the point of call instead of approximating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        operation: &'static str,
        backend: &'static str,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("copy of {key} did not reach a terminal state within {waited:?}")]
    ConsistencyTimeout { key: String, waited: Duration },

    #[error("failed to copy file: {0}")]
    CopyFailed(String),

    #[error("conflict at {path}: {message}")]
    Conflict { path: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound(key.into())
    }

    pub fn container_not_found(name: impl Into<String>) -> Self {
        Error::ContainerNotFound(name.into())
    }

    pub fn already_exists(key: impl Into<String>) -> Self {
        Error::AlreadyExists(key.into())
    }

    pub fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Error::Unsupported { operation, backend }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    pub fn conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Conflict {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the error means "the object is not there", as opposed to a
    /// fault talking to the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}
