//! Shared helpers for the integration suites

#![allow(dead_code)]

pub use cellbtree::prelude::*;

/// File id used by single-page tests
pub const FILE_ID: u64 = 3;
/// Page index used by single-page tests
pub const PAGE_INDEX: u64 = 11;

/// Install a test-writer subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .try_init();
}

/// Pool with 4 KiB pages
pub fn test_pool() -> PageBufferPool {
    PageBufferPool::with_options(PoolOptions::for_testing()).expect("test pool")
}

/// Pool with a custom page size
pub fn sized_pool(page_size: usize) -> PageBufferPool {
    PageBufferPool::new(page_size).expect("sized pool")
}

/// Formatted bucket page at (`FILE_ID`, `page_index`) with no recorded operations
pub fn bucket_page(pool: &PageBufferPool, page_index: u64, is_leaf: bool) -> CacheEntry {
    let mut entry = CacheEntry::new(CachePointer::new(
        pool.acquire_direct(false),
        FILE_ID,
        page_index,
    ));
    Bucket::new(&mut entry).init(is_leaf).expect("init bucket");
    entry.clear_page_operations();
    entry
}

/// Formatted leaf bucket at the default page
pub fn leaf_page(pool: &PageBufferPool) -> CacheEntry {
    bucket_page(pool, PAGE_INDEX, true)
}

/// Formatted non-leaf bucket at the default page
pub fn non_leaf_page(pool: &PageBufferPool) -> CacheEntry {
    bucket_page(pool, PAGE_INDEX, false)
}

/// Independently allocated page with the same identity and a byte copy of `original`
pub fn restored_copy(pool: &PageBufferPool, original: &CacheEntry) -> CacheEntry {
    let restored = CacheEntry::new(CachePointer::new(
        pool.acquire_direct(false),
        original.file_id(),
        original.page_index(),
    ));
    let mut src = original.buffer_duplicate();
    let mut dst = restored.buffer_duplicate();
    dst.put(&mut src).expect("copy page");
    restored
}

/// Give a page back to its pool
pub fn release(pool: &PageBufferPool, entry: CacheEntry) {
    pool.release(entry.into_cache_pointer().into_pointer());
}

/// Snapshot of the page bytes
pub fn page_bytes(entry: &CacheEntry) -> Vec<u8> {
    entry.buffer_duplicate().to_vec()
}

/// Serialized record id
pub fn rid(cluster_id: i16, cluster_position: i64) -> Vec<u8> {
    RecordIdCodec
        .serialize_to_vec(&RecordId::new(cluster_id, cluster_position))
        .expect("serialize rid")
}

/// Take the single operation recorded on `entry`
pub fn single_operation(entry: &mut CacheEntry) -> PageOperation {
    let mut operations = entry.take_page_operations();
    assert_eq!(operations.len(), 1, "expected exactly one page operation");
    operations.remove(0)
}

/// Decoded values of every leaf entry, in order
pub fn leaf_values(entry: &mut CacheEntry) -> Vec<RecordId> {
    let bucket = Bucket::new(entry);
    (0..bucket.size())
        .map(|i| bucket.get_value(i, &RecordIdCodec).expect("leaf value"))
        .collect()
}

/// (left, right) children of every separator, in order
pub fn children(entry: &mut CacheEntry) -> Vec<(u32, u32)> {
    let bucket = Bucket::new(entry);
    (0..bucket.size())
        .map(|i| {
            (
                bucket.left_child(i).expect("left child"),
                bucket.right_child(i).expect("right child"),
            )
        })
        .collect()
}
