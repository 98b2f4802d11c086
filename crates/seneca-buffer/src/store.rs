//! Buffer storage abstraction and the filesystem implementation

use crate::error::BufferError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File extension of result buffers
pub const BUFFER_EXTENSION: &str = "jsonl";

/// Access to the per-routine result buffers
///
/// Implementations must list buffers in a stable order; the reconciliation
/// order of a tick follows it.
pub trait BufferStore: Send + Sync {
    /// List buffer paths in stable order
    ///
    /// # Errors
    /// Returns `BufferError::Io` if the buffer directory cannot be read.
    fn list_buffers(&self) -> Result<Vec<PathBuf>, BufferError>;

    /// Read a whole buffer
    ///
    /// # Errors
    /// Returns `BufferError::Missing` if the buffer no longer exists.
    fn read(&self, path: &Path) -> Result<Vec<u8>, BufferError>;

    /// Truncate a buffer so consumed entries are never replayed
    ///
    /// # Errors
    /// Returns `BufferError::Io` on failure; a missing buffer is not an error.
    fn clear(&self, path: &Path) -> Result<(), BufferError>;

    /// Replace a buffer's contents with `tail`, an unfinished final line
    ///
    /// # Errors
    /// Returns `BufferError::Io` on failure; a missing buffer is not an error.
    fn retain_tail(&self, path: &Path, tail: &[u8]) -> Result<(), BufferError>;

    /// Remove a buffer
    ///
    /// # Errors
    /// Returns `BufferError::Io` on failure; a missing buffer is not an error.
    fn delete(&self, path: &Path) -> Result<(), BufferError>;

    /// Read then truncate; `None` when the buffer vanished
    ///
    /// # Errors
    /// Propagates IO errors other than a missing buffer.
    fn read_and_clear(&self, path: &Path) -> Result<Option<Vec<u8>>, BufferError> {
        match self.read(path) {
            Ok(bytes) => {
                self.clear(path)?;
                Ok(Some(bytes))
            }
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete every buffer, returning how many were removed
    ///
    /// # Errors
    /// Propagates listing and deletion errors.
    fn delete_all(&self) -> Result<usize, BufferError> {
        let paths = self.list_buffers()?;
        for path in &paths {
            self.delete(path)?;
        }
        Ok(paths.len())
    }
}

/// Buffers stored as `*.jsonl` files in one directory
#[derive(Debug, Clone)]
pub struct FsBufferStore {
    dir: PathBuf,
}

impl FsBufferStore {
    /// Open a store, creating the directory if needed
    ///
    /// # Errors
    /// Returns `BufferError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BufferError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| BufferError::from_io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Buffer directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Buffer path for a routine file (`fit.py` → `<dir>/fit.jsonl`)
    #[must_use]
    pub fn buffer_path(&self, routine_file: &str) -> PathBuf {
        let stem = Path::new(routine_file)
            .file_stem()
            .map_or_else(|| routine_file.to_string(), |s| s.to_string_lossy().into_owned());
        self.dir.join(format!("{stem}.{BUFFER_EXTENSION}"))
    }
}

impl BufferStore for FsBufferStore {
    fn list_buffers(&self) -> Result<Vec<PathBuf>, BufferError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| BufferError::from_io(&self.dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BufferError::from_io(&self.dir, e))?;
            let path = entry.path();
            let is_buffer = path.extension().is_some_and(|ext| ext == BUFFER_EXTENSION);
            if is_buffer && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, BufferError> {
        fs::read(path).map_err(|e| BufferError::from_io(path, e))
    }

    fn clear(&self, path: &Path) -> Result<(), BufferError> {
        // Truncate in place; recreating the file would race with producers
        // that keep it open in append mode.
        match fs::OpenOptions::new().write(true).truncate(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) => match BufferError::from_io(path, e) {
                BufferError::Missing(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    fn retain_tail(&self, path: &Path, tail: &[u8]) -> Result<(), BufferError> {
        let mut file = match fs::OpenOptions::new().write(true).truncate(true).open(path) {
            Ok(file) => file,
            Err(e) => {
                return match BufferError::from_io(path, e) {
                    BufferError::Missing(_) => Ok(()),
                    other => Err(other),
                }
            }
        };
        file.write_all(tail).map_err(|e| BufferError::from_io(path, e))
    }

    fn delete(&self, path: &Path) -> Result<(), BufferError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) => match BufferError::from_io(path, e) {
                BufferError::Missing(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}
