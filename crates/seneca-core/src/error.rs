//! Error types for the analysis loop and routine supervision

use crate::session::SessionState;
use seneca_buffer::BufferError;
use std::path::PathBuf;

/// Analysis error type
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Requested lifecycle transition is not allowed from the current state
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Buffer directory could not be listed or modified
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Status log parent directory does not exist
    #[error("'{}' is not a valid directory", .0.display())]
    InvalidLogDirectory(PathBuf),

    /// Status log could not be written
    #[error("status log {path}: {source}")]
    StatusLog {
        /// Log file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Background analysis task failed to join
    #[error("analysis task failed: {0}")]
    Task(String),
}

impl AnalysisError {
    /// Check if the error is a rejected lifecycle request
    #[inline]
    #[must_use]
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}

/// Routine supervision errors
#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    /// No routine with this id or name
    #[error("routine not found: {0}")]
    NotFound(String),

    /// Routine is already running
    #[error("routine already running: {0}")]
    AlreadyRunning(String),

    /// Routine is not running
    #[error("routine not running: {0}")]
    NotRunning(String),

    /// Process could not be spawned
    #[error("failed to spawn '{name}': {source}")]
    Spawn {
        /// Routine name
        name: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Signal delivery failed
    #[error("failed to signal '{name}': {reason}")]
    Signal {
        /// Routine name
        name: String,
        /// Failure reason
        reason: String,
    },

    /// Routine directory error
    #[error("routine directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoutineError {
    /// Check if the error comes from the request rather than the system
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AlreadyRunning(_) | Self::NotRunning(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_names_states() {
        let err = AnalysisError::IllegalTransition {
            from: SessionState::Running,
            to: SessionState::Running,
        };
        assert_eq!(err.to_string(), "illegal transition: running -> running");
        assert!(err.is_illegal_transition());
    }

    #[test]
    fn invalid_log_directory_message() {
        let err = AnalysisError::InvalidLogDirectory(PathBuf::from("/nope"));
        assert_eq!(err.to_string(), "'/nope' is not a valid directory");
    }

    #[test]
    fn routine_client_errors() {
        assert!(RoutineError::NotFound("x".into()).is_client_error());
        assert!(!RoutineError::Io(std::io::Error::other("boom")).is_client_error());
    }
}
