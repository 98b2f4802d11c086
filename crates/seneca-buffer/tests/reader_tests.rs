use seneca_buffer::{BufferReader, BufferStore, Disposition, FsBufferStore};
use seneca_record::{RecordError, RecordKind, WireEntry};
use seneca_test_utils::{append_buffer, plot_entry, table_entry, write_buffer, write_raw_buffer};
use serde_json::json;
use std::fs;

fn reader(dir: &std::path::Path) -> BufferReader<FsBufferStore> {
    BufferReader::new(FsBufferStore::open(dir).unwrap())
}

#[test]
fn test_buffer_is_cleared_after_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_buffer(
        dir.path(),
        "fit.py",
        &[plot_entry("fit.py", "linear_fit", 0), WireEntry::message("fit.py", "step 1")],
    );

    let batches: Vec<_> = reader(dir.path()).batches().unwrap().collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records.len(), 2);
    assert_eq!(batches[0].disposition, Disposition::Cleared);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    // Entries are never replayed
    assert_eq!(reader(dir.path()).batches().unwrap().count(), 0);
}

#[test]
fn test_complete_deletes_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_buffer(
        dir.path(),
        "fit.py",
        &[plot_entry("fit.py", "p", 0), WireEntry::complete("fit.py")],
    );

    let batch = reader(dir.path()).read_buffer(&path).unwrap().unwrap();
    assert!(batch.completed());
    assert_eq!(batch.disposition, Disposition::Deleted);
    assert!(!path.exists());
}

#[test]
fn test_empty_buffer_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw_buffer(dir.path(), "idle.jsonl", b"");
    assert!(reader(dir.path()).read_buffer(&path).unwrap().is_none());
    assert!(path.exists());
}

#[test]
fn test_partial_write_is_left_for_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let partial = b"{\"type\":\"plot\",\"file\":\"fit.py\",\"na";
    let path = write_raw_buffer(dir.path(), "fit.jsonl", partial);

    assert!(reader(dir.path()).read_buffer(&path).unwrap().is_none());
    assert_eq!(fs::read(&path).unwrap(), partial);
}

#[test]
fn test_complete_lines_before_partial_write_are_consumed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_buffer(dir.path(), "fit.py", &[plot_entry("fit.py", "first", 0)]);
    let partial: &[u8] = b"{\"type\":\"plot\",\"file\":\"fit.py\",\"na";
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(partial);
    fs::write(&path, bytes).unwrap();

    let batch = reader(dir.path()).read_buffer(&path).unwrap().unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].name, "first");
    assert!(batch.issues.is_empty());
    assert_eq!(batch.disposition, Disposition::Trimmed);
    assert_eq!(fs::read(&path).unwrap(), partial);
}

#[test]
fn test_bad_line_mid_buffer_is_cleared_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_raw_buffer(dir.path(), "fit.jsonl", b"garbage line\n");
    append_buffer(dir.path(), "fit.py", &[plot_entry("fit.py", "lost", 0)]);

    let r = reader(dir.path());
    let batch = r.read_buffer(&path).unwrap().unwrap();
    assert!(batch.records.is_empty());
    assert_eq!(batch.issues.len(), 1);
    assert!(matches!(batch.issues[0].error, RecordError::Wire { line: 1, .. }));
    assert!(batch.issues[0]
        .status_text()
        .starts_with("'fit.jsonl': malformed record skipped ("));
    assert_eq!(batch.disposition, Disposition::Cleared);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    // Later output from the same routine flows again
    append_buffer(dir.path(), "fit.py", &[plot_entry("fit.py", "next", 1)]);
    let batch = r.read_buffer(&path).unwrap().unwrap();
    assert_eq!(batch.records[0].name, "next");
    assert!(batch.issues.is_empty());
}

#[test]
fn test_malformed_record_stops_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_buffer(
        dir.path(),
        "fit.py",
        &[
            plot_entry("fit.py", "first", 0),
            WireEntry::plot("fit.py", "broken", "%%%"),
            plot_entry("fit.py", "never", 0),
        ],
    );

    let batch = reader(dir.path()).read_buffer(&path).unwrap().unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].name, "first");
    assert_eq!(batch.issues.len(), 1);
    assert!(batch.issues[0].error.is_malformed());
    assert!(batch.issues[0].status_text().contains("malformed record skipped"));
    // Not retried
    assert_eq!(batch.disposition, Disposition::Cleared);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_malformed_record_keeps_complete_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let mut bad = table_entry("fit.py", "t", 0, json!({}));
    bad.data = None;
    let path = write_buffer(dir.path(), "fit.py", &[WireEntry::complete("fit.py"), bad]);

    let batch = reader(dir.path()).read_buffer(&path).unwrap().unwrap();
    assert!(batch.completed());
    assert_eq!(batch.disposition, Disposition::Cleared);
    assert!(path.exists());
}

#[test]
fn test_unknown_kind_skips_only_that_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut odd = WireEntry::complete("fit.py");
    odd.kind = Some("video".to_string());
    let path = write_buffer(
        dir.path(),
        "fit.py",
        &[odd, plot_entry("fit.py", "after", 0)],
    );

    let batch = reader(dir.path()).read_buffer(&path).unwrap().unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].kind, RecordKind::Plot);
    assert!(matches!(batch.issues[0].error, RecordError::UnknownKind(_)));
    assert_eq!(
        batch.issues[0].status_text(),
        "'fit.py': unknown record kind 'video'"
    );
}

#[test]
fn test_corrupt_buffer_does_not_hide_others() {
    let dir = tempfile::tempdir().unwrap();
    write_buffer(dir.path(), "a.py", &[plot_entry("a.py", "p", 0)]);
    write_raw_buffer(dir.path(), "b.jsonl", b"\x00\x01garbage");
    write_buffer(dir.path(), "c.py", &[plot_entry("c.py", "p", 0)]);

    let files: Vec<_> = reader(dir.path())
        .batches()
        .unwrap()
        .flat_map(|b| b.records)
        .map(|r| r.routine_file)
        .collect();
    assert_eq!(files, vec!["a.py", "c.py"]);
}

#[test]
fn test_buffers_are_read_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_buffer(dir.path(), "zeta.py", &[plot_entry("zeta.py", "p", 0)]);
    write_buffer(dir.path(), "alpha.py", &[plot_entry("alpha.py", "p", 0)]);

    let r = reader(dir.path());
    let order: Vec<_> = r.batches().unwrap().map(|b| b.records[0].routine_file.clone()).collect();
    assert_eq!(order, vec!["alpha.py", "zeta.py"]);
    assert_eq!(r.store().list_buffers().unwrap().len(), 2);
}
