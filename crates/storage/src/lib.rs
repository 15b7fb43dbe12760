//! Page storage for the cell B-tree
//!
//! This crate implements the page-level half of the index:
//! - PageBufferPool: recycled fixed-size page blocks
//! - CacheEntry: a page with identity and its pending page operations
//! - Bucket: slotted-page B-tree node (leaf and non-leaf)
//! - Page operations: byte-exact redo/undo records for every bucket mutation
//!
//! Buckets never compare keys and never split; the index layer above decides
//! positions and reacts to `Ok(false)` from inserts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bucket;
pub mod cache;
pub mod page;
pub mod po;
pub mod pool;

pub use bucket::{Bucket, BucketEntry, BUCKET_HEADER_SIZE, MIN_PAGE_SIZE};
pub use cache::{BufferView, CacheEntry, CachePointer};
pub use page::DurablePage;
pub use po::{
    AddLeafEntryPO, AddNonLeafEntryPO, PageOperation, PageOperationHeader, PageOperationKind,
    PageOperationRecord, RemoveLeafEntryPO, RemoveNonLeafEntryPO, SetRightSiblingPO, ShrinkPO,
    UpdateValuePO,
};
pub use pool::{PageBufferPool, PoolOptions, PoolStats, Pointer};
