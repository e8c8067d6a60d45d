//! Error types for the watcher

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to list a watched path
#[derive(Debug, Error)]
pub enum ListError {
    /// The listed path itself does not exist
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Permission or other I/O failure on the listed path
    #[error("failed to list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    /// Classify an I/O error raised while listing `path`
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ListError::NotFound(path)
        } else {
            ListError::Io { path, source }
        }
    }

    /// Path the failure refers to
    pub fn path(&self) -> &Path {
        match self {
            ListError::NotFound(path) => path,
            ListError::Io { path, .. } => path,
        }
    }

    /// Whether the listed path has vanished
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListError::NotFound(_))
    }
}

/// Errors surfaced by the watcher, either returned from a call or sent on the error channel
#[derive(Debug, Error)]
pub enum WatchError {
    /// `start` was given an interval below the minimum resolution
    #[error("polling interval is shorter than 1ns")]
    DurationTooShort,

    /// `start` was called while the poll loop is running
    #[error("watcher is already running")]
    AlreadyRunning,

    /// The watcher has been closed and cannot be restarted
    #[error("watcher is closed")]
    Closed,

    /// A watched root disappeared and was deregistered
    #[error("watched file or folder deleted: {}", .0.display())]
    WatchedPathDeleted(PathBuf),

    /// Listing a path failed
    #[error(transparent)]
    List(#[from] ListError),

    /// A path could not be made absolute
    #[error("failed to resolve path {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An ignore pattern could not be compiled
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),
}
