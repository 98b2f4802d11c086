//! Buffer reader: decode buffers into records, then consume them

use crate::error::BufferError;
use crate::store::BufferStore;
use seneca_record::{decode_buffer, RecordError, RecordKind, ResultRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What happened to a buffer after it was read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Truncated after reading
    Cleared,
    /// Consumed up to an unfinished final line, which is kept
    Trimmed,
    /// Removed after a completion marker was consumed
    Deleted,
}

/// A per-record problem found while reading a buffer
#[derive(Debug)]
pub struct BufferIssue {
    /// Routine file of the entry, or the buffer name when unknown
    pub source: String,
    /// Decoding error
    pub error: RecordError,
}

impl BufferIssue {
    /// Status panel text for the issue
    #[must_use]
    pub fn status_text(&self) -> String {
        match &self.error {
            RecordError::UnknownKind(kind) => {
                format!("'{}': unknown record kind '{}'", self.source, kind)
            }
            other => format!("'{}': malformed record skipped ({})", self.source, other),
        }
    }
}

/// Records decoded from one buffer in one tick
#[derive(Debug)]
pub struct BufferBatch {
    /// Buffer path
    pub path: PathBuf,
    /// Records in file order
    pub records: Vec<ResultRecord>,
    /// Per-record problems, in file order
    pub issues: Vec<BufferIssue>,
    /// Whether the buffer was cleared or deleted
    pub disposition: Disposition,
}

impl BufferBatch {
    /// Whether a completion marker was read
    #[must_use]
    pub fn completed(&self) -> bool {
        self.records.iter().any(|r| r.kind == RecordKind::Complete)
    }
}

/// Consumes buffers from a [`BufferStore`]
#[derive(Debug, Clone)]
pub struct BufferReader<S> {
    store: S,
}

impl<S: BufferStore> BufferReader<S> {
    /// Create a reader over a store
    #[inline]
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lazily read every buffer in store order
    ///
    /// Buffers that yield nothing this tick (empty, vanished, mid-write or
    /// unreadable) are skipped; they never end the iteration.
    ///
    /// # Errors
    /// Returns `BufferError` only if the buffers cannot be listed.
    pub fn batches(&self) -> Result<impl Iterator<Item = BufferBatch> + '_, BufferError> {
        let paths = self.store.list_buffers()?;
        Ok(paths.into_iter().filter_map(move |path| match self.read_buffer(&path) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "buffer skipped");
                None
            }
        }))
    }

    /// Read, decode and consume one buffer
    ///
    /// Returns `Ok(None)` when the buffer is empty, vanished, or holds only
    /// an unfinished line (left untouched for the next tick). Complete lines
    /// are consumed; an unfinished final line is kept for the next tick. A
    /// bad line or malformed record ends the batch there; the whole buffer is
    /// cleared and not retried.
    ///
    /// # Errors
    /// Returns `BufferError::Io` if the buffer cannot be read or consumed.
    pub fn read_buffer(&self, path: &Path) -> Result<Option<BufferBatch>, BufferError> {
        let bytes = match self.store.read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_missing() => {
                debug!(path = %path.display(), "buffer vanished before read");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        let decoded = decode_buffer(&bytes);
        if decoded.is_pending_only() {
            debug!(path = %path.display(), pending = decoded.pending, "write in progress, retrying next tick");
            return Ok(None);
        }

        let buffer_name = path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        let mut records = Vec::with_capacity(decoded.entries.len());
        let mut issues = Vec::new();
        let mut aborted = false;

        for entry in decoded.entries {
            let source = entry.file.clone().unwrap_or_else(|| buffer_name.clone());
            match ResultRecord::from_entry(entry) {
                Ok(record) => records.push(record),
                Err(error @ RecordError::UnknownKind(_)) => {
                    warn!(buffer = %buffer_name, error = %error, "record skipped");
                    issues.push(BufferIssue { source, error });
                }
                Err(error) => {
                    warn!(buffer = %buffer_name, error = %error, "malformed record, abandoning buffer");
                    issues.push(BufferIssue { source, error });
                    aborted = true;
                    break;
                }
            }
        }
        if let Some(error) = decoded.error.filter(|_| !aborted) {
            warn!(buffer = %buffer_name, error = %error, "unreadable line, abandoning buffer");
            issues.push(BufferIssue {
                source: buffer_name.clone(),
                error,
            });
            aborted = true;
        }

        let completed = records.iter().any(|r| r.kind == RecordKind::Complete);
        let disposition = if completed && !aborted {
            self.store.delete(path)?;
            Disposition::Deleted
        } else if decoded.pending > 0 && !aborted {
            self.store.retain_tail(path, &bytes[bytes.len() - decoded.pending..])?;
            Disposition::Trimmed
        } else {
            self.store.clear(path)?;
            Disposition::Cleared
        };

        debug!(
            buffer = %buffer_name,
            records = records.len(),
            issues = issues.len(),
            ?disposition,
            "buffer consumed"
        );

        Ok(Some(BufferBatch {
            path: path.to_path_buf(),
            records,
            issues,
            disposition,
        }))
    }
}
