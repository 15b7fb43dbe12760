//! # cellbtree
//!
//! Slotted-page B-tree buckets whose every mutation is recorded as a page
//! operation that can be redone and undone byte-for-byte.
//!
//! ## Quick Start
//!
//! ```
//! use cellbtree::prelude::*;
//!
//! let pool = PageBufferPool::new(4096)?;
//! let mut entry = CacheEntry::new(CachePointer::new(pool.acquire_direct(false), 0, 0));
//!
//! let mut bucket = Bucket::new(&mut entry);
//! bucket.init(true)?;
//! let value = RecordIdCodec.serialize_to_vec(&RecordId::new(1, 10))?;
//! assert!(bucket.add_leaf_entry(0, b"key", &value)?);
//!
//! // One page operation per successful mutation
//! let mut log = OperationLog::new();
//! assert_eq!(log.drain(&mut entry), 1);
//! # Ok::<(), cellbtree::Error>(())
//! ```
//!
//! ## Crates
//!
//! - `cellbtree_core` - identity types, binary codecs, the error type
//! - [`storage`] - buffer pool, cache entries, buckets, page operations
//! - [`durability`] - checksummed operation log and replay

#![warn(missing_docs)]

pub mod prelude;

pub use cellbtree_durability as durability;
pub use cellbtree_storage as storage;

// Re-export main entry points
pub use cellbtree_core::{Error, Result};
pub use cellbtree_durability::{OperationLog, ReplayOptions, ReplayResult, Replayer};
pub use cellbtree_storage::{Bucket, CacheEntry, PageBufferPool, PageOperation};
