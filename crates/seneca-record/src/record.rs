//! Validated result records

use crate::error::RecordError;
use crate::key::RecordKey;
use crate::kind::RecordKind;
use crate::wire::{WireEntry, WIRE_VERSION};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;

/// Table payload; a `BTreeMap` so iteration is always in key order
pub type TableData = BTreeMap<String, serde_json::Value>;

/// Kind-specific record payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Status text
    Message(String),
    /// Completion marker
    Complete,
    /// Base64 image bytes, with an optional companion table (plots only)
    Image {
        /// Base64 encoded image (no `data:` prefix)
        base64: String,
        /// Companion table rendered next to the image
        table: Option<TableData>,
    },
    /// Key/value table
    Table(TableData),
}

/// One decoded unit of analysis output
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// Record kind
    pub kind: RecordKind,
    /// Producing routine file
    pub routine_file: String,
    /// Logical name (empty for messages and completion markers)
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Version counter; the greater one wins for the same key
    pub sequence_counter: u64,
    /// Kind-specific payload
    pub payload: Payload,
}

impl ResultRecord {
    /// Build a record from one wire entry
    ///
    /// # Errors
    /// - `RecordError::UnsupportedVersion` for entries not written as v1
    /// - `RecordError::UnknownKind` for an unrecognized `type`
    /// - `RecordError::Malformed` for absent required fields, invalid base64
    ///   or table data that is not a mapping
    pub fn from_entry(entry: WireEntry) -> Result<Self, RecordError> {
        if entry.v != WIRE_VERSION {
            return Err(RecordError::UnsupportedVersion(entry.v));
        }
        let kind: RecordKind = entry
            .kind
            .as_deref()
            .ok_or_else(|| RecordError::missing("type"))?
            .parse()?;
        let routine_file = entry
            .file
            .filter(|f| !f.is_empty())
            .ok_or_else(|| RecordError::missing("file"))?;

        let name = if kind.is_displayable() {
            entry
                .name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| RecordError::missing("name"))?
        } else {
            entry.name.unwrap_or_default()
        };

        let payload = match kind {
            RecordKind::Message => {
                Payload::Message(entry.message.ok_or_else(|| RecordError::missing("message"))?)
            }
            RecordKind::Complete => Payload::Complete,
            RecordKind::Plot | RecordKind::Image => {
                let url = entry.url.ok_or_else(|| RecordError::missing("url"))?;
                let base64 = validate_base64(&url)?;
                // An empty mapping means the plot function returned no table
                let table = match entry.data {
                    Some(value) if kind == RecordKind::Plot => {
                        parse_table(value)?.filter(|t| !t.is_empty())
                    }
                    _ => None,
                };
                Payload::Image { base64, table }
            }
            RecordKind::Table => {
                let value = entry.data.ok_or_else(|| RecordError::missing("data"))?;
                Payload::Table(parse_table(value)?.unwrap_or_default())
            }
        };

        Ok(Self {
            kind,
            routine_file,
            name,
            description: entry.description.filter(|d| !d.is_empty()),
            sequence_counter: entry.counter.unwrap_or(0),
            payload,
        })
    }

    /// Identity key; `None` for messages and completion markers
    #[must_use]
    pub fn key(&self) -> Option<RecordKey> {
        self.kind
            .is_displayable()
            .then(|| RecordKey::new(self.routine_file.clone(), self.kind, self.name.clone()))
    }

    /// Image as a `data:` URL usable as an `<img>` source
    #[must_use]
    pub fn image_url(&self) -> Option<String> {
        match &self.payload {
            Payload::Image { base64, .. } => Some(format!("data:image/png;base64,{base64}")),
            _ => None,
        }
    }

    /// Table payload, or the companion table of a plot
    #[must_use]
    pub fn table(&self) -> Option<&TableData> {
        match &self.payload {
            Payload::Table(data) => Some(data),
            Payload::Image { table, .. } => table.as_ref(),
            _ => None,
        }
    }

    /// Status text for message records
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Message(text) => Some(text),
            _ => None,
        }
    }
}

fn validate_base64(url: &str) -> Result<String, RecordError> {
    let raw = match url.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => url,
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RecordError::malformed("url", "empty image payload"));
    }
    STANDARD
        .decode(raw)
        .map_err(|e| RecordError::malformed("url", e.to_string()))?;
    Ok(raw.to_string())
}

fn parse_table(value: serde_json::Value) -> Result<Option<TableData>, RecordError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map.into_iter().collect())),
        serde_json::Value::String(text) => {
            let inner: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| RecordError::malformed("data", e.to_string()))?;
            match inner {
                serde_json::Value::Object(map) => Ok(Some(map.into_iter().collect())),
                other => Err(RecordError::malformed(
                    "data",
                    format!("expected a mapping, found {other}"),
                )),
            }
        }
        other => Err(RecordError::malformed(
            "data",
            format!("expected a mapping, found {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PNG: &str = "iVBORw0KGgo=";

    #[test]
    fn plot_record_from_entry() {
        let entry = WireEntry::plot("fit.py", "linear_fit", PNG)
            .with_counter(2)
            .with_description("linear fit");
        let record = ResultRecord::from_entry(entry).unwrap();

        assert_eq!(record.kind, RecordKind::Plot);
        assert_eq!(record.sequence_counter, 2);
        assert_eq!(record.description.as_deref(), Some("linear fit"));
        assert_eq!(
            record.image_url().unwrap(),
            format!("data:image/png;base64,{PNG}")
        );
        assert!(record.table().is_none());
        assert_eq!(
            record.key().unwrap(),
            RecordKey::new("fit.py", RecordKind::Plot, "linear_fit")
        );
    }

    #[test]
    fn plot_companion_table_from_json_string() {
        let entry = WireEntry::plot("fit.py", "linear_fit", PNG).with_data(json!("{\"b\": 2, \"a\": 1}"));
        let record = ResultRecord::from_entry(entry).unwrap();
        let keys: Vec<_> = record.table().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn plot_empty_companion_table_is_dropped() {
        let entry = WireEntry::plot("fit.py", "hist", PNG).with_data(json!("{}"));
        let record = ResultRecord::from_entry(entry).unwrap();
        assert!(record.table().is_none());
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let entry = WireEntry::image("cam.py", "frame", format!("data:image/png;base64,{PNG}"));
        let record = ResultRecord::from_entry(entry).unwrap();
        assert!(matches!(record.payload, Payload::Image { ref base64, .. } if base64 == PNG));
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let err = ResultRecord::from_entry(WireEntry::plot("fit.py", "p", "not base64!!")).unwrap_err();
        assert!(matches!(err, RecordError::Malformed { field: "url", .. }));
    }

    #[test]
    fn invalid_embedded_json_is_malformed() {
        let err = ResultRecord::from_entry(WireEntry::table("fit.py", "t", json!("{oops"))).unwrap_err();
        assert!(matches!(err, RecordError::Malformed { field: "data", .. }));
    }

    #[test]
    fn table_data_must_be_mapping() {
        let err = ResultRecord::from_entry(WireEntry::table("fit.py", "t", json!([1, 2]))).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn missing_name_is_malformed() {
        let mut entry = WireEntry::table("fit.py", "t", json!({}));
        entry.name = None;
        let err = ResultRecord::from_entry(entry).unwrap_err();
        assert!(matches!(err, RecordError::Malformed { field: "name", .. }));
    }

    #[test]
    fn missing_file_is_malformed() {
        let mut entry = WireEntry::complete("fit.py");
        entry.file = None;
        assert!(ResultRecord::from_entry(entry).unwrap_err().is_malformed());
    }

    #[test]
    fn unknown_kind_is_reported() {
        let mut entry = WireEntry::complete("fit.py");
        entry.kind = Some("video".to_string());
        assert!(matches!(
            ResultRecord::from_entry(entry),
            Err(RecordError::UnknownKind(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut entry = WireEntry::complete("fit.py");
        entry.v = 2;
        assert!(matches!(
            ResultRecord::from_entry(entry),
            Err(RecordError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn message_has_no_key() {
        let record = ResultRecord::from_entry(WireEntry::message("fit.py", "step 3")).unwrap();
        assert_eq!(record.message(), Some("step 3"));
        assert!(record.key().is_none());
        assert!(record.name.is_empty());
    }
}
