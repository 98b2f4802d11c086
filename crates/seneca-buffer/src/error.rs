//! Error types for buffer access

use std::path::PathBuf;

/// Errors raised by a [`BufferStore`](crate::BufferStore)
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// Buffer vanished between listing and reading
    #[error("buffer file missing: {0}")]
    Missing(PathBuf),

    /// IO error on a buffer or the buffer directory
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl BufferError {
    /// Map an IO error, turning `NotFound` into [`BufferError::Missing`]
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::Missing(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// Whether the buffer simply is not there (no data this tick)
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}
