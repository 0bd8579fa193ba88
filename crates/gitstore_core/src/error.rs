//! Error types for gitstore_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for gitstore_core operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Resolution walked up to the filesystem root without finding a repository.
    #[error("no git repository found at or above {}", path.display())]
    PathNotFound {
        /// The path resolution started from
        path: PathBuf,
    },

    /// The filesystem refused access during resolution or validation.
    #[error("permission denied: {}", path.display())]
    PermissionDenied {
        /// The path that could not be accessed
        path: PathBuf,
    },

    /// A `.git` entry exists but is neither a directory nor a gitdir pointer.
    #[error("{} exists but is not a git directory", path.display())]
    NotADirectory {
        /// Path of the offending `.git` entry
        path: PathBuf,
    },

    /// A name or relative path would escape its namespace.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// On-disk index structures are present but unreadable, partial or incompatible.
    #[error("index {name:?} cannot be opened: {reason}")]
    IndexOpen {
        /// Index name
        name: String,
        /// Description of the failure
        reason: String,
    },

    /// The index store is held open by another handle or process.
    #[error("index {name:?} is in use by another handle or process")]
    IndexBusy {
        /// Index name
        name: String,
    },

    /// Search engine failure on an index that opened fine.
    #[error("search error in index {name:?}: {reason}")]
    Search {
        /// Index name
        name: String,
        /// Description of the failure
        reason: String,
    },

    /// An index object was used after it was closed or cleared.
    #[error("index {name:?} is closed")]
    IndexClosed {
        /// Index name
        name: String,
    },

    /// The repository handle was used after `close()`.
    #[error("repository handle used after close")]
    UseAfterClose,

    /// One or more indices failed to close.
    #[error("{count} error(s) while closing repository, first: {first}")]
    Close {
        /// The first error encountered
        first: Box<StoreError>,
        /// Total number of errors
        count: usize,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error for descriptors and stored values.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during directory creation, removal or flush.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`StoreError`] for callers that branch on remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No repository at the given location.
    NotFound,
    /// Repository found but its storage is not accessible.
    Access,
    /// Persisted index data is corrupt or incompatible.
    Corrupt,
    /// The data is fine but currently held elsewhere.
    Busy,
    /// The API was misused (bad name, closed handle).
    Usage,
    /// Any other disk failure.
    Io,
}

impl StoreError {
    /// Builds the error for a filesystem failure at `path`.
    ///
    /// Permission failures are kept distinct from generic I/O.
    pub(crate) fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path: path.into() }
        } else {
            Self::Io(err)
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathNotFound { .. } | Self::NotADirectory { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::Access,
            Self::IndexOpen { .. } => ErrorKind::Corrupt,
            Self::IndexBusy { .. } => ErrorKind::Busy,
            Self::InvalidName { .. } | Self::IndexClosed { .. } | Self::UseAfterClose => {
                ErrorKind::Usage
            }
            Self::Close { first, .. } => first.kind(),
            Self::Search { .. } | Self::Config(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::PathNotFound { .. } | Self::NotADirectory { .. } => Some(
                "No git repository found here. Run the command inside a repository or pass -C <path>.",
            ),
            Self::PermissionDenied { .. } => Some(
                "The repository was found but its private storage is not accessible. Check ownership and permissions of the .git directory.",
            ),
            Self::IndexOpen { .. } => Some(
                "The index exists but is corrupt or incompatible. Run 'gitstore index clear <name>' and rebuild it.",
            ),
            Self::IndexBusy { .. } => Some(
                "The index is open in another gitstore handle or process. Close it there and retry; the index itself is intact.",
            ),
            Self::IndexClosed { .. } => {
                Some("The index was closed or cleared. Request it again from the repository.")
            }
            Self::Close { first, .. } => first.recovery_suggestion(),
            _ => None,
        }
    }
}

/// Convenience Result type for gitstore_core operations.
pub type Result<T> = std::result::Result<T, StoreError>;
