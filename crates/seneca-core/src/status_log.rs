//! Status log file
//!
//! Every status line shown in the browser can also be appended to a plain
//! text file, one timestamped line per message.

use crate::error::AnalysisError;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Optional append-only sink for status lines
#[derive(Debug, Default)]
pub struct StatusLog {
    path: Mutex<Option<PathBuf>>,
}

impl StatusLog {
    /// Log disabled
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Log to `path`
    ///
    /// # Errors
    /// Returns [`AnalysisError::InvalidLogDirectory`] if the parent directory
    /// does not exist
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AnalysisError> {
        let log = Self::default();
        log.set_path(Some(path.into()))?;
        Ok(log)
    }

    /// Current log file
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.path.lock().clone()
    }

    /// Change the log file; `None` stops logging
    ///
    /// Returns whether the path actually changed.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InvalidLogDirectory`] if the parent directory
    /// does not exist; the previous path is kept
    pub fn set_path(&self, path: Option<PathBuf>) -> Result<bool, AnalysisError> {
        if let Some(path) = &path {
            let parent = parent_dir(path);
            if !parent.is_dir() {
                return Err(AnalysisError::InvalidLogDirectory(parent.to_path_buf()));
            }
        }
        let mut current = self.path.lock();
        if *current == path {
            return Ok(false);
        }
        *current = path;
        Ok(true)
    }

    /// Append one line, prefixed with the local time
    ///
    /// Does nothing when logging is disabled.
    ///
    /// # Errors
    /// Returns [`AnalysisError::StatusLog`] if the file cannot be written
    pub fn append(&self, message: &str) -> Result<(), AnalysisError> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "[{stamp}] {message}"))
            .map_err(|source| AnalysisError::StatusLog { path, source })
    }
}

/// Parent directory of a log path; a bare file name lives in the current directory
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_log_writes_nothing() {
        let log = StatusLog::disabled();
        assert!(log.append("hello").is_ok());
        assert_eq!(log.path(), None);
    }

    #[test]
    fn appends_timestamped_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status.log");
        let log = StatusLog::new(&path).unwrap();

        log.append("Analysis started").unwrap();
        log.append("'fit.py': Analysis complete!").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Analysis started"));
        assert!(lines[1].ends_with("] 'fit.py': Analysis complete!"));
    }

    #[test]
    fn rejects_missing_parent_and_keeps_previous_path() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.log");
        let log = StatusLog::new(&good).unwrap();

        let err = log
            .set_path(Some(dir.path().join("missing").join("b.log")))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidLogDirectory(_)));
        assert_eq!(log.path(), Some(good));
    }

    #[test]
    fn reports_whether_path_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        let log = StatusLog::disabled();
        assert!(log.set_path(Some(path.clone())).unwrap());
        assert!(!log.set_path(Some(path)).unwrap());
        assert!(log.set_path(None).unwrap());
        assert!(!log.set_path(None).unwrap());
    }
}
