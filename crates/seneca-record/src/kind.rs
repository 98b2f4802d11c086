//! Record kinds

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Kind of a result record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Free-text status message from a routine
    Message,
    /// Routine finished; its buffer is deleted after this tick
    Complete,
    /// Generated plot image, optionally with a companion table
    Plot,
    /// Key/value table
    Table,
    /// Arbitrary image file sent by a routine
    Image,
}

impl RecordKind {
    /// All recognized kinds
    pub const ALL: [Self; 5] = [
        Self::Message,
        Self::Complete,
        Self::Plot,
        Self::Table,
        Self::Image,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Complete => "complete",
            Self::Plot => "plot",
            Self::Table => "table",
            Self::Image => "image",
        }
    }

    /// Whether records of this kind materialize an element in the UI
    #[inline]
    #[must_use]
    pub const fn is_displayable(self) -> bool {
        matches!(self, Self::Plot | Self::Table | Self::Image)
    }

    /// Whether records of this kind carry image bytes
    #[inline]
    #[must_use]
    pub const fn is_image(self) -> bool {
        matches!(self, Self::Plot | Self::Image)
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecordError::UnknownKind(s.to_string()))
    }
}
