//! Identity keys and DOM addressing
//!
//! A [`RecordKey`] names one on-screen element for the lifetime of an
//! analysis run. DOM ids are derived from it with a Blake3 digest so they are
//! stable across processes and free of characters that break CSS selectors.

use crate::kind::RecordKind;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Identity of a displayable record: same key, same UI element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Producing routine
    pub routine_file: String,
    /// Record kind
    pub kind: RecordKind,
    /// Logical name within the routine
    pub name: String,
}

impl RecordKey {
    /// Create a new key
    #[inline]
    pub fn new(routine_file: impl Into<String>, kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            routine_file: routine_file.into(),
            kind,
            name: name.into(),
        }
    }

    /// Stable DOM id for the element this key addresses
    #[must_use]
    pub fn dom_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(self.routine_file.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.name.as_bytes());
        let hash = hasher.finalize();
        format!("e{}", &hash.to_hex()[..16])
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.routine_file, self.kind, self.name)
    }
}

/// Deterministic id derived from a seed string, e.g. `stable_id("f", "fit.py")`
#[must_use]
pub fn stable_id(marker: &str, seed: &str) -> String {
    let hash = blake3::hash(seed.as_bytes());
    format!("{marker}{}", &hash.to_hex()[..16])
}
