//! Replay Tests
//!
//! Redo and rollback of the two-page history, including damaged logs.

use crate::common::*;
use crate::history::{self, FIRST, SECOND};
use cellbtree::durability::FRAME_HEADER_SIZE;

#[test]
fn redo_from_formatted_pages_matches_live_pages() {
    init_tracing();
    let history = history::build();
    let mut pages = history.formatted_pages();

    let result = Replayer::default().redo(&history.log, &mut pages).unwrap();
    assert_eq!(result.applied, history.log.len() as u64);
    assert_eq!(result.skipped, 0);
    assert!(!result.has_issues());
    assert_eq!(result.last_sequence, Some(history.log.next_sequence() - 1));

    assert_eq!(page_bytes(&pages[0]), history.page_bytes(0));
    assert_eq!(page_bytes(&pages[1]), history.page_bytes(1));
    // Replay does not record new operations
    assert!(pages.iter().all(|page| page.page_operations().is_empty()));
}

#[test]
fn fast_replay_matches_strict_replay_on_an_intact_log() {
    let history = history::build();
    let mut strict = history.formatted_pages();
    let mut fast = history.formatted_pages();

    let strict_result = Replayer::new(ReplayOptions::strict())
        .redo(&history.log, &mut strict)
        .unwrap();
    let fast_result = Replayer::new(ReplayOptions::fast())
        .redo(&history.log, &mut fast)
        .unwrap();

    assert_eq!(strict_result, fast_result);
    assert_eq!(page_bytes(&strict[1]), page_bytes(&fast[1]));
}

#[test]
fn rollback_restores_pages_before_the_unit() {
    init_tracing();
    let mut history = history::build();
    let log = history.log.clone();

    let result = Replayer::default()
        .rollback(&log, history.unit_b, &mut history.pages)
        .unwrap();
    // Three records on the first page, one shrink on the second
    assert_eq!(result.applied, 4);
    assert_eq!(history.page_bytes(0), history.after_a);
    assert_eq!(
        leaf_values(&mut history.pages[1]),
        vec![RecordId::new(2, 1), RecordId::new(2, 2)]
    );

    // Rolling back A as well leaves freshly formatted pages
    Replayer::default()
        .rollback(&log, history.unit_a, &mut history.pages)
        .unwrap();
    assert_eq!(history.page_bytes(0), history.formatted[0]);
    assert_eq!(history.page_bytes(1), history.formatted[1]);
}

#[test]
fn rollback_of_an_unknown_unit_is_a_no_op() {
    let mut history = history::build();
    let before = history.page_bytes(0);
    let log = history.log.clone();

    let result = Replayer::default()
        .rollback(&log, OperationUnitId::new(), &mut history.pages)
        .unwrap();
    assert_eq!(result.applied, 0);
    assert_eq!(result.last_sequence, None);
    assert_eq!(history.page_bytes(0), before);
}

/// Log with one byte flipped inside the first record of the second page
fn damaged_log(history: &history::History) -> OperationLog {
    let offset = history.frame_offsets(SECOND)[0];
    let mut bytes = history.log.as_bytes().to_vec();
    bytes[offset + FRAME_HEADER_SIZE + 12] ^= 0xFF;
    OperationLog::from_bytes(bytes).unwrap()
}

#[test]
fn strict_replay_rejects_a_corrupt_frame() {
    let history = history::build();
    let log = damaged_log(&history);
    let mut pages = history.formatted_pages();

    let err = Replayer::new(ReplayOptions::strict())
        .redo(&log, &mut pages)
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }), "{:?}", err);
    assert!(err.is_corruption());
}

#[test]
fn permissive_replay_counts_the_corrupt_frame() {
    init_tracing();
    let history = history::build();
    let log = damaged_log(&history);
    let mut pages = history.formatted_pages();
    let mut first_only = vec![pages.remove(0)];

    let result = Replayer::new(ReplayOptions::permissive())
        .redo(&log, &mut first_only)
        .unwrap();
    assert_eq!(result.corrupt, 1);
    assert!(result.has_issues());
    assert_eq!(result.applied, history.records_for(FIRST));
    assert_eq!(result.skipped, history.records_for(SECOND) - 1);
    assert_eq!(page_bytes(&first_only[0]), history.page_bytes(0));
    assert!(result.summary().contains("1 corrupt"));
}
