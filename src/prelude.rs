//! Convenient imports for cellbtree.
//!
//! ```
//! use cellbtree::prelude::*;
//!
//! let pool = PageBufferPool::with_options(PoolOptions::for_testing())?;
//! assert_eq!(pool.page_size(), 4096);
//! # Ok::<(), Error>(())
//! ```

// Error handling
pub use cellbtree_core::{Error, Result};

// Identity and codecs
pub use cellbtree_core::{
    BinaryCodec, ByteCodec, IntegerCodec, OperationUnitId, PageId, RecordId, RecordIdCodec,
};

// Pages and buckets
pub use cellbtree_storage::{
    Bucket, BucketEntry, BufferView, CacheEntry, CachePointer, PageBufferPool, PoolOptions,
};

// Page operations
pub use cellbtree_storage::{PageOperation, PageOperationKind, PageOperationRecord};

// Operation log
pub use cellbtree_durability::{OperationLog, ReplayOptions, ReplayResult, Replayer};
