//! Runtime configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) yields a usable configuration.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_plot_data_dir() -> PathBuf {
    PathBuf::from("plot_data")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("routines")
}

fn default_period_secs() -> f64 {
    1.0
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

/// Seneca configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenecaConfig {
    /// Directory holding routine output buffers
    #[serde(default = "default_plot_data_dir")]
    pub plot_data_dir: PathBuf,

    /// Directory holding routine scripts
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Seconds between analysis ticks
    #[serde(default = "default_period_secs")]
    pub period_secs: f64,

    /// Optional file receiving a copy of every status line
    #[serde(default)]
    pub status_log: Option<PathBuf>,

    /// HTTP listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Program used to run routine scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

impl Default for SenecaConfig {
    fn default() -> Self {
        Self {
            plot_data_dir: default_plot_data_dir(),
            upload_dir: default_upload_dir(),
            period_secs: default_period_secs(),
            status_log: None,
            bind: default_bind(),
            interpreter: default_interpreter(),
        }
    }
}

impl SenecaConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`AnalysisError::Config`] if the text is not valid TOML for
    /// this structure or fails validation
    pub fn from_toml(text: &str) -> Result<Self, AnalysisError> {
        let config: Self =
            toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`AnalysisError::Config`] if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Set the buffer directory
    #[inline]
    #[must_use]
    pub fn with_plot_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plot_data_dir = dir.into();
        self
    }

    /// Set the routine directory
    #[inline]
    #[must_use]
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set the tick period in seconds
    #[inline]
    #[must_use]
    pub fn with_period_secs(mut self, secs: f64) -> Self {
        self.period_secs = secs;
        self
    }

    /// Set the status log file
    #[inline]
    #[must_use]
    pub fn with_status_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_log = Some(path.into());
        self
    }

    /// Set the listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set the routine interpreter
    #[inline]
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Tick period
    ///
    /// # Errors
    /// Returns [`AnalysisError::Config`] when `period_secs` is not a usable
    /// duration
    pub fn period(&self) -> Result<Duration, AnalysisError> {
        period_from_secs(self.period_secs)
    }

    /// Check invariants
    ///
    /// # Errors
    /// Returns [`AnalysisError::Config`] for a period that is non-positive,
    /// non-finite or too large for a `Duration`, or an empty interpreter
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.period()?;
        if self.interpreter.trim().is_empty() {
            return Err(AnalysisError::Config("interpreter must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Convert a period in seconds, rejecting values no tick loop can use
///
/// # Errors
/// Returns [`AnalysisError::Config`] unless `secs` is finite, positive and
/// representable as a `Duration`
pub fn period_from_secs(secs: f64) -> Result<Duration, AnalysisError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(AnalysisError::Config(format!(
            "period_secs must be positive, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AnalysisError::Config(format!("period_secs {secs} out of range: {e}")))
}
