//! Redo/Undo Property Tests
//!
//! Random mutation sequences on small pages. After every step that logs an
//! operation, the operation must:
//! - decode from its own bytes
//! - redo the pre-image copy into the post-image
//! - undo the post-image copy back into the pre-image
//! - undo and redo in place on the live page

use crate::common::*;
use proptest::collection::vec;
use proptest::prelude::*;

const PAGE_SIZE: usize = 512;

#[derive(Debug, Clone)]
enum LeafStep {
    Add {
        pos: usize,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        pos: usize,
    },
    Update {
        pos: usize,
        fill: u8,
    },
    Sibling(Option<u64>),
    Shrink {
        keep: usize,
    },
}

fn leaf_step() -> impl Strategy<Value = LeafStep> {
    prop_oneof![
        5 => (any::<usize>(), vec(any::<u8>(), 0..8), vec(any::<u8>(), 0..24))
            .prop_map(|(pos, key, value)| LeafStep::Add { pos, key, value }),
        2 => any::<usize>().prop_map(|pos| LeafStep::Remove { pos }),
        1 => (any::<usize>(), any::<u8>()).prop_map(|(pos, fill)| LeafStep::Update { pos, fill }),
        1 => proptest::option::of(0u64..1_000).prop_map(LeafStep::Sibling),
        1 => any::<usize>().prop_map(|keep| LeafStep::Shrink { keep }),
    ]
}

#[derive(Debug, Clone)]
enum NonLeafStep {
    Add {
        pos: usize,
        left: u32,
        right: u32,
        key: Vec<u8>,
    },
    Remove {
        pos: usize,
        keep_left: bool,
    },
}

fn non_leaf_step() -> impl Strategy<Value = NonLeafStep> {
    prop_oneof![
        3 => (any::<usize>(), any::<u32>(), any::<u32>(), vec(any::<u8>(), 0..12))
            .prop_map(|(pos, left, right, key)| NonLeafStep::Add { pos, left, right, key }),
        2 => (any::<usize>(), any::<bool>())
            .prop_map(|(pos, keep_left)| NonLeafStep::Remove { pos, keep_left }),
    ]
}

fn apply_leaf_step(entry: &mut CacheEntry, step: &LeafStep) {
    let mut bucket = Bucket::new(entry);
    let size = bucket.size();
    match step {
        LeafStep::Add { pos, key, value } => {
            bucket.add_leaf_entry(pos % (size + 1), key, value).unwrap();
        }
        LeafStep::Remove { pos } if size > 0 => {
            let index = pos % size;
            let key = bucket.raw_key(index).unwrap();
            let value = bucket.raw_value(index).unwrap();
            bucket.remove_leaf_entry(index, &key, &value).unwrap();
        }
        LeafStep::Update { pos, fill } if size > 0 => {
            let index = pos % size;
            let key_size = bucket.raw_key(index).unwrap().len();
            let value = vec![*fill; bucket.raw_value(index).unwrap().len()];
            bucket.update_value(index, &value, key_size).unwrap();
        }
        LeafStep::Sibling(sibling) => bucket.set_right_sibling(*sibling).unwrap(),
        LeafStep::Shrink { keep } => {
            bucket.shrink(keep % (size + 1), false, &ByteCodec).unwrap();
        }
        _ => {}
    }
}

fn apply_non_leaf_step(entry: &mut CacheEntry, step: &NonLeafStep) {
    let mut bucket = Bucket::new(entry);
    let size = bucket.size();
    match step {
        NonLeafStep::Add {
            pos,
            left,
            right,
            key,
        } => {
            bucket
                .add_non_leaf_entry(pos % (size + 1), *left, *right, key, true)
                .unwrap();
        }
        NonLeafStep::Remove { pos, keep_left } if size > 0 => {
            let index = pos % size;
            let key = bucket.raw_key(index).unwrap();
            let prev_child = if *keep_left {
                bucket.left_child(index).unwrap()
            } else {
                bucket.right_child(index).unwrap()
            };
            bucket.remove_non_leaf_entry(index, &key, prev_child).unwrap();
        }
        _ => {}
    }
}

/// Check the logged operation (if any) against the recorded images
fn check_step(
    pool: &PageBufferPool,
    entry: &mut CacheEntry,
    pre_image: &[u8],
    pre_copy: CacheEntry,
) -> std::result::Result<(), TestCaseError> {
    let post_image = page_bytes(entry);
    let mut operations = entry.take_page_operations();
    prop_assert!(operations.len() <= 1);

    let Some(operation) = operations.pop() else {
        // Rejected or skipped: nothing may have changed
        prop_assert_eq!(&post_image[..], pre_image);
        release(pool, pre_copy);
        return Ok(());
    };

    let bytes = operation.to_bytes();
    prop_assert_eq!(bytes.len(), operation.serialized_size());
    let decoded = PageOperation::from_bytes(&bytes).unwrap();
    prop_assert_eq!(&decoded, &operation);

    // Cross-buffer: redo on the independent copy of the pre-image
    let mut replayed = pre_copy;
    decoded.redo(&mut replayed).unwrap();
    prop_assert_eq!(page_bytes(&replayed), post_image.clone());
    decoded.undo(&mut replayed).unwrap();
    prop_assert_eq!(&page_bytes(&replayed)[..], pre_image);
    release(pool, replayed);

    // In place on the live page
    operation.undo(entry).unwrap();
    prop_assert_eq!(&page_bytes(entry)[..], pre_image);
    operation.redo(entry).unwrap();
    prop_assert_eq!(page_bytes(entry), post_image);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn leaf_steps_redo_and_undo_exactly(steps in vec(leaf_step(), 1..60)) {
        let pool = sized_pool(PAGE_SIZE);
        let mut entry = leaf_page(&pool);

        for step in &steps {
            let pre_image = page_bytes(&entry);
            let pre_copy = restored_copy(&pool, &entry);
            apply_leaf_step(&mut entry, step);
            check_step(&pool, &mut entry, &pre_image, pre_copy)?;
        }
    }

    #[test]
    fn non_leaf_steps_redo_and_undo_exactly(steps in vec(non_leaf_step(), 1..60)) {
        let pool = sized_pool(PAGE_SIZE);
        let mut entry = non_leaf_page(&pool);

        for step in &steps {
            let pre_image = page_bytes(&entry);
            let pre_copy = restored_copy(&pool, &entry);
            apply_non_leaf_step(&mut entry, step);
            check_step(&pool, &mut entry, &pre_image, pre_copy)?;
        }
    }

    #[test]
    fn undoing_a_whole_history_restores_the_empty_page(steps in vec(leaf_step(), 1..40)) {
        let pool = sized_pool(PAGE_SIZE);
        let mut entry = leaf_page(&pool);
        let empty = page_bytes(&entry);

        for step in &steps {
            apply_leaf_step(&mut entry, step);
        }
        let history = entry.take_page_operations();
        for operation in history.iter().rev() {
            operation.undo(&mut entry).unwrap();
        }
        prop_assert_eq!(page_bytes(&entry), empty);
    }
}
