//! Leaf Bucket Tests
//!
//! Insert, remove and update of leaf entries, including the leaf insert
//! scenario replayed against a copied page.

use crate::common::*;

// ============================================================================
// Insert
// ============================================================================

#[test]
fn leaf_insert_in_middle_logs_one_operation() {
    init_tracing();
    let pool = test_pool();
    let mut entry = leaf_page(&pool);

    let mut bucket = Bucket::new(&mut entry);
    assert!(bucket.add_leaf_entry(0, &[0], &rid(0, 0)).unwrap());
    assert!(bucket.add_leaf_entry(1, &[2], &rid(2, 2)).unwrap());
    assert_eq!(bucket.size(), 2);
    entry.clear_page_operations();

    let pre_insert = restored_copy(&pool, &entry);

    let mut bucket = Bucket::new(&mut entry);
    assert!(bucket.add_leaf_entry(1, &[1], &rid(1, 1)).unwrap());
    assert_eq!(bucket.size(), 3);
    assert_eq!(
        leaf_values(&mut entry),
        vec![RecordId::new(0, 0), RecordId::new(1, 1), RecordId::new(2, 2)]
    );

    let operation = single_operation(&mut entry);
    match &operation {
        PageOperation::AddLeafEntry(po) => {
            assert_eq!(po.index, 1);
            assert_eq!(po.key, vec![1]);
            assert_eq!(po.value, rid(1, 1));
            assert_eq!(po.header.page_id, PageId::new(FILE_ID, PAGE_INDEX));
        }
        other => panic!("expected AddLeafEntry, got {:?}", other),
    }

    // Redo against the pre-insert copy reproduces the insert
    let mut replayed = pre_insert;
    operation.redo(&mut replayed).unwrap();
    assert_eq!(page_bytes(&replayed), page_bytes(&entry));

    // Undo against the post-insert state reproduces the two-entry page
    operation.undo(&mut entry).unwrap();
    assert_eq!(Bucket::new(&mut entry).size(), 2);
    assert_eq!(
        leaf_values(&mut entry),
        vec![RecordId::new(0, 0), RecordId::new(2, 2)]
    );
}

#[test]
fn leaf_insert_at_both_ends() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);

    bucket.add_leaf_entry(0, &[5], &rid(5, 0)).unwrap();
    bucket.add_leaf_entry(0, &[1], &rid(1, 0)).unwrap();
    bucket.add_leaf_entry(2, &[9], &rid(9, 0)).unwrap();

    let keys: Vec<_> = (0..3).map(|i| bucket.raw_key(i).unwrap()).collect();
    assert_eq!(keys, vec![vec![1], vec![5], vec![9]]);
    assert_eq!(entry.page_operations().len(), 3);
}

#[test]
fn leaf_empty_key_and_value() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);

    assert!(bucket.add_leaf_entry(0, &[], &[]).unwrap());
    assert_eq!(bucket.raw_key(0).unwrap(), Vec::<u8>::new());
    assert_eq!(bucket.raw_value(0).unwrap(), Vec::<u8>::new());
    assert_eq!(bucket.remove_leaf_entry(0, &[], &[]).unwrap(), 0);
}

#[test]
fn leaf_variable_length_keys() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);

    let keys: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i; i as usize + 1]).collect();
    for (i, key) in keys.iter().enumerate() {
        assert!(bucket.add_leaf_entry(i, key, &rid(i as i16, i as i64)).unwrap());
    }
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(&bucket.raw_key(i).unwrap(), key);
        assert_eq!(
            bucket.get_value(i, &RecordIdCodec).unwrap(),
            RecordId::new(i as i16, i as i64)
        );
    }
}

// ============================================================================
// Remove
// ============================================================================

#[test]
fn leaf_remove_returns_new_size_and_logs() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);
    for i in 0..4 {
        bucket.add_leaf_entry(i, &[i as u8], &rid(i as i16, 0)).unwrap();
    }
    entry.clear_page_operations();

    let mut bucket = Bucket::new(&mut entry);
    assert_eq!(bucket.remove_leaf_entry(2, &[2], &rid(2, 0)).unwrap(), 3);
    assert_eq!(
        leaf_values(&mut entry),
        vec![RecordId::new(0, 0), RecordId::new(1, 0), RecordId::new(3, 0)]
    );

    let operation = single_operation(&mut entry);
    assert!(matches!(
        &operation,
        PageOperation::RemoveLeafEntry(po) if po.index == 2 && po.key == vec![2] && po.value == rid(2, 0)
    ));
}

#[test]
fn leaf_remove_then_reinsert_restores_page() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);
    for i in 0..5 {
        bucket
            .add_leaf_entry(i, &vec![i as u8; i + 1], &rid(i as i16, 7))
            .unwrap();
    }
    let before = page_bytes(&entry);

    let mut bucket = Bucket::new(&mut entry);
    bucket.remove_leaf_entry(1, &[1, 1], &rid(1, 7)).unwrap();
    bucket.add_leaf_entry(1, &[1, 1], &rid(1, 7)).unwrap();
    assert_eq!(page_bytes(&entry), before);
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn leaf_update_value_in_place() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);
    bucket.add_leaf_entry(0, &[1, 2, 3], &rid(1, 1)).unwrap();
    bucket.add_leaf_entry(1, &[4, 5, 6], &rid(2, 2)).unwrap();
    let free = bucket.free_space();
    entry.clear_page_operations();

    let mut bucket = Bucket::new(&mut entry);
    bucket.update_value(1, &rid(9, 99), 3).unwrap();
    assert_eq!(bucket.free_space(), free);
    assert_eq!(
        bucket.get_entry(1, &RecordIdCodec).unwrap(),
        BucketEntry::Leaf {
            key: vec![4, 5, 6],
            value: RecordId::new(9, 99)
        }
    );

    let operation = single_operation(&mut entry);
    assert!(matches!(
        &operation,
        PageOperation::UpdateValue(po) if po.prev_value == rid(2, 2) && po.value == rid(9, 99) && po.key_size == 3
    ));
}

#[test]
fn leaf_right_sibling_round_trip() {
    let pool = test_pool();
    let mut entry = leaf_page(&pool);
    let mut bucket = Bucket::new(&mut entry);

    assert_eq!(bucket.right_sibling(), None);
    bucket.set_right_sibling(Some(12)).unwrap();
    bucket.set_right_sibling(Some(13)).unwrap();
    assert_eq!(bucket.right_sibling(), Some(13));

    let operations = entry.take_page_operations();
    assert!(matches!(
        &operations[1],
        PageOperation::SetRightSibling(po) if po.prev_right_sibling == Some(12) && po.right_sibling == Some(13)
    ));
}
