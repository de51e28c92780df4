use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::containers::ContainerError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store file {path}: {reason}")]
    CorruptStore { path: PathBuf, reason: String },

    #[error("store writer for {0} is closed")]
    WriterClosed(PathBuf),

    #[error("session {found} does not match the store session {expected}")]
    SessionMismatch { expected: Uuid, found: Uuid },

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error concerns the store medium rather than a single container
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StoreError::Container(_))
    }
}
