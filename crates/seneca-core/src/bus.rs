//! Patch fan-out
//!
//! Every patch goes to a broadcast channel read by the transport. Status
//! lines are mirrored to the status log on the way through.

use crate::error::AnalysisError;
use crate::status_log::StatusLog;
use seneca_patch::{Patch, PatchSink};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the patch channel; slow subscribers lag rather than block the loop
pub const PATCH_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast sink shared by the analysis loop and routine supervision
#[derive(Debug, Clone)]
pub struct PatchBus {
    sender: broadcast::Sender<Patch>,
    log: Arc<StatusLog>,
}

impl PatchBus {
    /// New bus with the default capacity
    #[must_use]
    pub fn new(log: Arc<StatusLog>) -> Self {
        Self::with_capacity(log, PATCH_CHANNEL_CAPACITY)
    }

    /// New bus with a custom channel capacity
    #[must_use]
    pub fn with_capacity(log: Arc<StatusLog>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, log }
    }

    /// Receive every patch published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Patch> {
        self.sender.subscribe()
    }

    /// Status log
    #[must_use]
    pub fn status_log(&self) -> &Arc<StatusLog> {
        &self.log
    }

    /// Publish one patch
    pub fn publish(&self, patch: Patch) {
        if let Some(text) = patch.status_text() {
            if let Err(e) = self.log.append(&text) {
                tracing::warn!(error = %e, "status log write failed");
            }
        }
        // No subscribers is normal before a browser connects
        let _ = self.sender.send(patch);
    }

    /// Publish patches in order
    pub fn publish_all(&self, patches: impl IntoIterator<Item = Patch>) {
        for patch in patches {
            self.publish(patch);
        }
    }

    /// Publish an `append_status` line
    pub fn status(&self, message: &str) {
        self.publish(Patch::status(message));
    }

    /// Change the status log file, reporting the outcome as a status line
    ///
    /// An empty (or blank) path stops logging. Setting the current path again
    /// is silent.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InvalidLogDirectory`] if the parent directory
    /// does not exist; the previous path stays active
    pub fn set_log_path(&self, path: &str) -> Result<Option<PathBuf>, AnalysisError> {
        let path = path.trim();
        if path.is_empty() {
            self.log.set_path(None)?;
            self.status("Logging stopped.");
            return Ok(None);
        }

        match self.log.set_path(Some(PathBuf::from(path))) {
            Ok(true) => self.status(&format!("Log path changed to '{path}'.")),
            Ok(false) => {}
            Err(e) => {
                if let AnalysisError::InvalidLogDirectory(dir) = &e {
                    self.status(&format!("'{}' is not a valid directory.", dir.display()));
                }
                return Err(e);
            }
        }
        Ok(self.log.path())
    }
}

impl PatchSink for PatchBus {
    fn send(&mut self, patch: Patch) {
        self.publish(patch);
    }
}
