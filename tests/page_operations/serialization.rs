//! Serialization Tests
//!
//! One operation of every kind, produced by a real bucket mutation, through
//! `to_stream`/`from_stream`.

use crate::common::*;

/// One operation of each kind, in tag order
fn one_of_each(pool: &PageBufferPool) -> Vec<PageOperation> {
    let unit = OperationUnitId::new();
    let mut leaf = leaf_page(pool);
    leaf.set_operation_unit_id(unit);
    let mut bucket = Bucket::new(&mut leaf);
    bucket.add_leaf_entry(0, &[1, 2, 3], &rid(1, 100)).unwrap();
    bucket.remove_leaf_entry(0, &[1, 2, 3], &rid(1, 100)).unwrap();
    bucket.add_leaf_entry(0, &[4], &rid(4, 4)).unwrap();
    bucket.add_leaf_entry(1, &[5], &rid(5, 5)).unwrap();
    let mut leaf_ops = leaf.take_page_operations();

    let mut non_leaf = non_leaf_page(pool);
    non_leaf.set_operation_unit_id(unit);
    let mut bucket = Bucket::new(&mut non_leaf);
    bucket.add_non_leaf_entry(0, 10, 20, &[9, 9], true).unwrap();
    bucket.add_non_leaf_entry(1, 20, 30, &[8], true).unwrap();
    bucket.remove_non_leaf_entry(1, &[8], 20).unwrap();
    let non_leaf_ops = non_leaf.take_page_operations();

    let mut bucket = Bucket::new(&mut leaf);
    bucket.update_value(1, &rid(6, 6), 1).unwrap();
    bucket.set_right_sibling(Some(99)).unwrap();
    bucket.shrink(1, true, &ByteCodec).unwrap();
    let tail_ops = leaf.take_page_operations();

    vec![
        leaf_ops.remove(0),
        leaf_ops.remove(0),
        non_leaf_ops[1].clone(),
        non_leaf_ops[2].clone(),
        tail_ops[0].clone(),
        tail_ops[1].clone(),
        tail_ops[2].clone(),
    ]
}

#[test]
fn every_kind_round_trips() {
    let pool = test_pool();
    let operations = one_of_each(&pool);

    for (tag, operation) in (1u8..).zip(&operations) {
        assert_eq!(operation.kind().as_u8(), tag);

        let bytes = operation.to_bytes();
        assert_eq!(bytes.len(), operation.serialized_size(), "{:?}", operation.kind());
        assert_eq!(bytes[1], tag);

        let decoded = PageOperation::from_bytes(&bytes).unwrap();
        assert_eq!(&decoded, operation);
    }
}

#[test]
fn concatenated_stream_decodes_in_order() {
    let pool = test_pool();
    let operations = one_of_each(&pool);

    let total: usize = operations.iter().map(PageOperation::serialized_size).sum();
    let mut buf = vec![0u8; total];
    let mut offset = 0;
    for operation in &operations {
        offset = operation.to_stream(&mut buf, offset);
    }
    assert_eq!(offset, total);

    let mut offset = 0;
    for expected in &operations {
        let (decoded, next) = PageOperation::from_stream(&buf, offset).unwrap();
        assert_eq!(&decoded, expected);
        offset = next;
    }
    assert_eq!(offset, buf.len());
}

#[test]
fn header_carries_page_identity_and_unit() {
    let pool = test_pool();
    let operations = one_of_each(&pool);
    let unit = operations[0].operation_unit_id();
    assert!(!unit.is_nil());

    for operation in &operations {
        assert_eq!(operation.page_id(), PageId::new(FILE_ID, PAGE_INDEX));
        assert_eq!(operation.operation_unit_id(), unit);
    }
}

#[test]
fn every_truncation_is_reported() {
    let pool = test_pool();
    for operation in one_of_each(&pool) {
        let bytes = operation.to_bytes();
        for len in 0..bytes.len() {
            let err = PageOperation::from_bytes(&bytes[..len]).unwrap_err();
            assert!(
                matches!(err, Error::Truncated { .. }),
                "{:?} cut at {}: {:?}",
                operation.kind(),
                len,
                err
            );
        }
    }
}
