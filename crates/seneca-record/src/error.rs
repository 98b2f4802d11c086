//! Error types for record decoding

/// Errors raised while decoding buffer entries into records
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A newline-terminated buffer line is not a JSON entry
    #[error("wire decode failed at line {line}: {source}")]
    Wire {
        /// 1-based line number inside the buffer
        line: usize,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Required field absent or payload undecodable
    #[error("malformed record: {field}: {reason}")]
    Malformed {
        /// Offending field
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },

    /// Entry `type` is not one of the recognized kinds
    #[error("unknown record kind '{0}'")]
    UnknownKind(String),

    /// Entry was written with a wire version this build does not read
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u32),

    /// Entry could not be encoded
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RecordError {
    /// Create a malformed-field error
    #[inline]
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    /// Create a missing-field error
    #[inline]
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::malformed(field, "missing")
    }

    /// Whether the error invalidates the rest of the buffer it came from
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::UnsupportedVersion(_))
    }
}
