//! `seneca inspect`: decode buffers without consuming them

use seneca_buffer::{BufferStore, FsBufferStore};
use seneca_record::{decode_buffer, ResultRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// What one buffer currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSummary {
    /// Buffer file name
    pub buffer: String,
    /// Decoded records
    pub records: usize,
    /// Record count per kind
    pub kinds: BTreeMap<String, usize>,
    /// Routines that wrote to the buffer
    pub routines: Vec<String>,
    /// Highest sequence counter seen
    pub max_counter: u64,
    /// Whether a completion marker is present
    pub complete: bool,
    /// Entries that failed to decode
    pub issues: Vec<String>,
    /// First line that is not a JSON entry; decoding stopped there
    pub parse_error: Option<String>,
    /// Bytes of an unfinished final line
    pub pending_bytes: usize,
}

/// Summarize every buffer in `dir`
///
/// # Errors
/// Returns an error if the directory cannot be listed or a buffer cannot be read
pub fn inspect_dir(dir: &Path) -> anyhow::Result<Vec<BufferSummary>> {
    let store = FsBufferStore::open(dir)?;
    let mut summaries = Vec::new();
    for path in store.list_buffers()? {
        let bytes = match store.read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_missing() => continue,
            Err(e) => return Err(e.into()),
        };
        let name = path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        summaries.push(summarize(name, &bytes));
    }
    Ok(summaries)
}

/// Summarize one buffer's bytes
#[must_use]
pub fn summarize(buffer: String, bytes: &[u8]) -> BufferSummary {
    let mut summary = BufferSummary {
        buffer,
        records: 0,
        kinds: BTreeMap::new(),
        routines: Vec::new(),
        max_counter: 0,
        complete: false,
        issues: Vec::new(),
        parse_error: None,
        pending_bytes: 0,
    };

    let decoded = decode_buffer(bytes);
    summary.parse_error = decoded.error.map(|e| e.to_string());
    summary.pending_bytes = decoded.pending;

    for entry in decoded.entries {
        match ResultRecord::from_entry(entry) {
            Ok(record) => {
                summary.records += 1;
                *summary.kinds.entry(record.kind.to_string()).or_default() += 1;
                summary.max_counter = summary.max_counter.max(record.sequence_counter);
                summary.complete |= record.kind == seneca_record::RecordKind::Complete;
                if !summary.routines.contains(&record.routine_file) {
                    summary.routines.push(record.routine_file);
                }
            }
            Err(e) => summary.issues.push(e.to_string()),
        }
    }
    summary
}

/// Human-readable report
#[must_use]
pub fn render_text(summaries: &[BufferSummary]) -> String {
    if summaries.is_empty() {
        return "no buffers\n".to_string();
    }
    let mut out = String::new();
    for s in summaries {
        let kinds: Vec<_> = s.kinds.iter().map(|(k, n)| format!("{k}={n}")).collect();
        let _ = writeln!(
            out,
            "{}: {} records [{}] routines [{}] max counter {}{}",
            s.buffer,
            s.records,
            kinds.join(", "),
            s.routines.join(", "),
            s.max_counter,
            if s.complete { ", complete" } else { "" }
        );
        for issue in &s.issues {
            let _ = writeln!(out, "  issue: {issue}");
        }
        if let Some(error) = &s.parse_error {
            let _ = writeln!(out, "  unreadable: {error}");
        }
        if s.pending_bytes > 0 {
            let _ = writeln!(out, "  pending: {} bytes of an unfinished line", s.pending_bytes);
        }
    }
    out
}
