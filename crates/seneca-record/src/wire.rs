//! Buffer wire format (JSON Lines, version 1)
//!
//! Every field of [`WireEntry`] except the version is optional at the JSON
//! level. A newline-terminated line that is not JSON is a wire error. An
//! unterminated final line that does not parse is a write still in progress
//! and is left pending. A line that is JSON but lacks a required field is a
//! malformed record, detected later by [`ResultRecord::from_entry`].
//!
//! [`ResultRecord::from_entry`]: crate::ResultRecord::from_entry

use crate::error::RecordError;
use crate::kind::RecordKind;
use serde::{Deserialize, Serialize};

/// Current wire version
pub const WIRE_VERSION: u32 = 1;

fn default_version() -> u32 {
    WIRE_VERSION
}

/// One raw buffer entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    /// Wire version
    #[serde(default = "default_version")]
    pub v: u32,
    /// Record kind as written by the producer
    #[serde(rename = "type", alias = "kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Producing routine file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Logical element name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-text description (shown as a tooltip)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version counter for the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    /// Status text (`message` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Base64 image bytes (`plot` and `image`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Table mapping, or a string holding a JSON mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WireEntry {
    fn bare(kind: RecordKind, file: impl Into<String>) -> Self {
        Self {
            v: WIRE_VERSION,
            kind: Some(kind.as_str().to_string()),
            file: Some(file.into()),
            name: None,
            description: None,
            counter: None,
            message: None,
            url: None,
            data: None,
        }
    }

    /// Status message entry
    pub fn message(file: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::bare(RecordKind::Message, file)
        }
    }

    /// Completion marker entry
    pub fn complete(file: impl Into<String>) -> Self {
        Self::bare(RecordKind::Complete, file)
    }

    /// Plot entry carrying base64 image bytes
    pub fn plot(file: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
            ..Self::bare(RecordKind::Plot, file)
        }
    }

    /// Image entry carrying base64 image bytes
    pub fn image(file: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
            ..Self::bare(RecordKind::Image, file)
        }
    }

    /// Table entry
    pub fn table(file: impl Into<String>, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: Some(name.into()),
            data: Some(data),
            ..Self::bare(RecordKind::Table, file)
        }
    }

    /// Set the version counter
    #[must_use]
    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach table data (companion table for plots)
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Result of decoding one buffer snapshot
#[derive(Debug, Default)]
pub struct DecodedBuffer {
    /// Entries in file order, up to the first bad line
    pub entries: Vec<WireEntry>,
    /// First complete line that is not a JSON entry; nothing after it is decoded
    pub error: Option<RecordError>,
    /// Length of the unterminated final line left for the next read
    pub pending: usize,
}

impl DecodedBuffer {
    /// Whether the snapshot holds nothing but a write in progress
    #[inline]
    #[must_use]
    pub fn is_pending_only(&self) -> bool {
        self.entries.is_empty() && self.error.is_none() && self.pending > 0
    }
}

/// Decode a buffer line by line, in file order
///
/// Blank lines are ignored. An unterminated final line is decoded when it is
/// already a complete entry and counted as [`pending`](DecodedBuffer::pending)
/// otherwise.
#[must_use]
pub fn decode_buffer(bytes: &[u8]) -> DecodedBuffer {
    let (complete, tail) = match bytes.iter().rposition(|b| *b == b'\n') {
        Some(end) => bytes.split_at(end + 1),
        None => (&bytes[..0], bytes),
    };

    let mut decoded = DecodedBuffer::default();
    for (idx, line) in complete.split(|b| *b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(entry) => decoded.entries.push(entry),
            Err(source) => {
                decoded.error = Some(RecordError::Wire { line: idx + 1, source });
                return decoded;
            }
        }
    }

    let last = tail.trim_ascii();
    if !last.is_empty() {
        match serde_json::from_slice(last) {
            Ok(entry) => decoded.entries.push(entry),
            Err(_) => decoded.pending = tail.len(),
        }
    }
    decoded
}

/// Encode entries as JSON Lines (one trailing newline per entry)
///
/// # Errors
/// Returns `RecordError::Encode` if an entry cannot be serialized.
pub fn encode_entries<'a>(
    entries: impl IntoIterator<Item = &'a WireEntry>,
) -> Result<String, RecordError> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_skips_blank_lines() {
        let buf = b"{\"type\":\"message\",\"file\":\"a.py\",\"message\":\"hi\"}\n\n  \r\n{\"type\":\"complete\",\"file\":\"a.py\"}\n";
        let decoded = decode_buffer(buf);
        assert!(decoded.error.is_none());
        assert_eq!(decoded.pending, 0);
        assert_eq!(decoded.entries.len(), 2);
        assert_eq!(decoded.entries[0].message.as_deref(), Some("hi"));
        assert_eq!(decoded.entries[1].kind.as_deref(), Some("complete"));
        assert_eq!(decoded.entries[1].v, WIRE_VERSION);
    }

    #[test]
    fn decode_accepts_kind_alias_without_newline() {
        let decoded = decode_buffer(br#"{"kind":"table","file":"a.py","name":"t","data":{}}"#);
        assert_eq!(decoded.entries[0].kind.as_deref(), Some("table"));
        assert_eq!(decoded.pending, 0);
    }

    #[test]
    fn unterminated_partial_line_is_pending() {
        let buf = b"{\"type\":\"complete\",\"file\":\"a.py\"}\n{\"type\":\"plo";
        let decoded = decode_buffer(buf);
        assert_eq!(decoded.entries.len(), 1);
        assert!(decoded.error.is_none());
        assert_eq!(decoded.pending, "{\"type\":\"plo".len());
        assert!(!decoded.is_pending_only());
        assert!(decode_buffer(b"{\"type\":").is_pending_only());
    }

    #[test]
    fn terminated_bad_line_stops_decoding() {
        let buf = b"{\"type\":\"complete\",\"file\":\"a.py\"}\ngarbage line\n{\"type\":\"complete\",\"file\":\"b.py\"}\n";
        let decoded = decode_buffer(buf);
        assert_eq!(decoded.entries.len(), 1);
        assert!(matches!(decoded.error, Some(RecordError::Wire { line: 2, .. })));
    }

    #[test]
    fn missing_fields_still_decode() {
        // Field validation happens in ResultRecord::from_entry
        let decoded = decode_buffer(br#"{"type":"plot"}"#);
        assert!(decoded.entries[0].file.is_none());
    }

    #[test]
    fn encode_then_decode_preserves_entry() {
        let entry = WireEntry::plot("fit.py", "linear_fit", "aGVsbG8=")
            .with_counter(4)
            .with_description("linear fit")
            .with_data(json!({"a": 1.5}));
        let text = encode_entries([&entry]).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"type\":\"plot\""));
        assert_eq!(decode_buffer(text.as_bytes()).entries, vec![entry]);
    }
}
