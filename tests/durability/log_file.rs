//! Log File Tests
//!
//! The operation log written to disk and read back.

use crate::common::*;
use crate::history::{self, FIRST};
use cellbtree::durability::FRAME_HEADER_SIZE;
use std::fs::{File, OpenOptions};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn log_round_trips_through_a_file() {
    init_tracing();
    let history = history::build();
    let file = NamedTempFile::new().unwrap();
    history.log.write_to(file.as_file()).unwrap();

    let restored = OperationLog::read_from(File::open(file.path()).unwrap()).unwrap();
    assert_eq!(restored.len(), history.log.len());
    assert_eq!(restored.next_sequence(), history.log.next_sequence());
    assert_eq!(restored.as_bytes(), history.log.as_bytes());
    assert_eq!(restored.records().unwrap(), history.log.records().unwrap());
}

#[test]
fn torn_tail_is_dropped_on_read() {
    init_tracing();
    let history = history::build();
    let file = NamedTempFile::new().unwrap();
    history.log.write_to(file.as_file()).unwrap();

    // Half of a frame header, as left by a crash mid-append
    let mut tail = OpenOptions::new().append(true).open(file.path()).unwrap();
    tail.write_all(&[0x40, 0, 0, 0, 0xAB, 0xCD]).unwrap();
    drop(tail);

    let restored = OperationLog::read_from(File::open(file.path()).unwrap()).unwrap();
    assert_eq!(restored.len(), history.log.len());
    assert_eq!(restored.as_bytes(), history.log.as_bytes());

    // Appending continues the sequence
    let mut restored = restored;
    let mut page = bucket_page(&history.pool, FIRST, true);
    Bucket::new(&mut page)
        .add_leaf_entry(0, b"fig", &rid(3, 3))
        .unwrap();
    assert_eq!(restored.drain(&mut page), 1);
    let records = restored.records().unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.sequence, history.log.next_sequence());
}

#[test]
fn frames_report_their_layout() {
    let history = history::build();
    let mut expected_offset = 0;
    for (sequence, frame) in (0u64..).zip(history.log.frames()) {
        let frame = frame.unwrap();
        assert_eq!(frame.offset(), expected_offset);
        assert_eq!(frame.sequence(), sequence);
        frame.verify().unwrap();

        let record = frame.decode(true).unwrap();
        assert_eq!(
            frame.end() - frame.offset(),
            FRAME_HEADER_SIZE + record.operation.serialized_size()
        );
        expected_offset = frame.end();
    }
    assert_eq!(expected_offset, history.log.as_bytes().len());
}
