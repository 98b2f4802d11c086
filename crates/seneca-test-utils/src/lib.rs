//! Testing utilities for the Seneca workspace
//!
//! Shared fixtures for records, wire entries and on-disk buffers.

#![allow(missing_docs)]

use seneca_record::{encode_entries, ResultRecord, WireEntry};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Base64 of the PNG signature; decodes, which is all records check
pub const PNG_BASE64: &str = "iVBORw0KGgo=";

pub fn plot_entry(file: &str, name: &str, counter: u64) -> WireEntry {
    WireEntry::plot(file, name, PNG_BASE64).with_counter(counter)
}

pub fn image_entry(file: &str, name: &str) -> WireEntry {
    WireEntry::image(file, name, PNG_BASE64)
}

pub fn table_entry(file: &str, name: &str, counter: u64, data: serde_json::Value) -> WireEntry {
    WireEntry::table(file, name, data).with_counter(counter)
}

pub fn plot_record(file: &str, name: &str, counter: u64) -> ResultRecord {
    ResultRecord::from_entry(plot_entry(file, name, counter)).unwrap()
}

pub fn table_record(file: &str, name: &str, counter: u64, data: serde_json::Value) -> ResultRecord {
    ResultRecord::from_entry(table_entry(file, name, counter, data)).unwrap()
}

pub fn message_record(file: &str, text: &str) -> ResultRecord {
    ResultRecord::from_entry(WireEntry::message(file, text)).unwrap()
}

pub fn complete_record(file: &str) -> ResultRecord {
    ResultRecord::from_entry(WireEntry::complete(file)).unwrap()
}

/// Buffer file path for a routine, matching `FsBufferStore::buffer_path`
pub fn buffer_path(dir: &Path, routine_file: &str) -> PathBuf {
    let stem = Path::new(routine_file)
        .file_stem()
        .map_or_else(|| routine_file.to_string(), |s| s.to_string_lossy().into_owned());
    dir.join(format!("{stem}.jsonl"))
}

/// Overwrite a routine's buffer with the given entries
pub fn write_buffer(dir: &Path, routine_file: &str, entries: &[WireEntry]) -> PathBuf {
    let path = buffer_path(dir, routine_file);
    fs::write(&path, encode_entries(entries).unwrap()).unwrap();
    path
}

/// Append entries to a routine's buffer, as a running routine would
pub fn append_buffer(dir: &Path, routine_file: &str, entries: &[WireEntry]) -> PathBuf {
    let path = buffer_path(dir, routine_file);
    let mut file = OpenOptions::new().create(true).append(true).open(&path).unwrap();
    file.write_all(encode_entries(entries).unwrap().as_bytes()).unwrap();
    path
}

/// Overwrite a buffer with raw bytes (corrupt or partial content)
pub fn write_raw_buffer(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
