//! Page buffer pool
//!
//! Hands out fixed-size page blocks and recycles released ones. The pool is
//! the one piece of this crate shared between threads: every page latch in the
//! process competes for its blocks, so all state sits behind `parking_lot`
//! mutexes and atomics.
//!
//! # Block lifecycle
//!
//! ```text
//! acquire_direct(clear) ──► Pointer ──► CachePointer / BufferView (shared)
//!                                  │
//! release(Pointer) ◄───────────────┘  recycled into the free list when no
//!                                     BufferView still aliases the block
//! ```

use crate::bucket::MIN_PAGE_SIZE;
use cellbtree_core::{Error, Result};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Shared page memory. The lock guards one call at a time; page latching
/// is the caller's job.
pub(crate) type PageBlock = RwLock<Box<[u8]>>;

/// Pointer ids are unique across every pool in the process, so a pool can
/// tell its own blocks from another pool's.
static NEXT_POINTER_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Options
// ============================================================================

/// Buffer pool options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Size of every block in bytes
    pub page_size: usize,
    /// Maximum number of released blocks kept for reuse
    pub max_pooled_blocks: usize,
    /// Whether outstanding blocks are tracked (enables release checks)
    pub track_allocations: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            page_size: 64 * 1024,
            max_pooled_blocks: 1024,
            track_allocations: true,
        }
    }
}

impl PoolOptions {
    /// Default options with a custom page size
    pub fn with_page_size(page_size: usize) -> Self {
        PoolOptions {
            page_size,
            ..Default::default()
        }
    }

    /// Options for tests: small pages, tracking on
    pub fn for_testing() -> Self {
        PoolOptions {
            page_size: 4096,
            max_pooled_blocks: 16,
            track_allocations: true,
        }
    }

    /// Check that a bucket fits in a page of this size
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(Error::PageTooSmall {
                size: self.page_size,
                minimum: MIN_PAGE_SIZE,
            });
        }
        if self.page_size > u32::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "page size {} exceeds the 32-bit offset range",
                self.page_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Pointer
// ============================================================================

/// Handle to one block acquired from a [`PageBufferPool`]
///
/// A pointer is owned by exactly one holder and must be handed back with
/// [`PageBufferPool::release`]. Views created from it alias the same bytes.
pub struct Pointer {
    id: u64,
    block: Arc<PageBlock>,
}

impl Pointer {
    /// Process-unique identifier of this block
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block size in bytes
    pub fn len(&self) -> usize {
        self.block.read().len()
    }

    /// Whether the block has zero length
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn shared(&self) -> Arc<PageBlock> {
        Arc::clone(&self.block)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.block.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.block.write()
    }
}

impl std::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pointer")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Blocks allocated from the system
    pub allocated_blocks: u64,
    /// Acquisitions served from the free list
    pub reused_blocks: u64,
    /// Blocks currently waiting in the free list
    pub pooled_blocks: usize,
    /// Blocks handed out and not yet released (0 when tracking is off)
    pub outstanding_blocks: usize,
    /// Bytes allocated from the system
    pub allocated_bytes: u64,
}

impl PoolStats {
    /// Fraction of acquisitions served from the free list
    pub fn reuse_rate(&self) -> f64 {
        let total = self.allocated_blocks + self.reused_blocks;
        if total == 0 {
            0.0
        } else {
            self.reused_blocks as f64 / total as f64
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Pool of fixed-size page blocks
///
/// # Thread Safety
///
/// All methods take `&self` and may be called concurrently; wrap the pool in
/// an `Arc` to share it.
pub struct PageBufferPool {
    options: PoolOptions,
    free: Mutex<Vec<Box<[u8]>>>,
    outstanding: Mutex<HashSet<u64>>,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl PageBufferPool {
    /// Create a pool with default options and the given page size
    pub fn new(page_size: usize) -> Result<Self> {
        Self::with_options(PoolOptions::with_page_size(page_size))
    }

    /// Create a pool from explicit options
    pub fn with_options(options: PoolOptions) -> Result<Self> {
        options.validate()?;
        debug!(
            page_size = options.page_size,
            max_pooled_blocks = options.max_pooled_blocks,
            "page buffer pool created"
        );
        Ok(PageBufferPool {
            options,
            free: Mutex::new(Vec::new()),
            outstanding: Mutex::new(HashSet::new()),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        })
    }

    /// Block size handed out by this pool
    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    /// Pool options
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Acquire a block
    ///
    /// Freshly allocated blocks are always zeroed. A recycled block keeps its
    /// previous content unless `clear` is set.
    pub fn acquire_direct(&self, clear: bool) -> Pointer {
        let recycled = self.free.lock().pop();
        let block = match recycled {
            Some(mut block) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                if clear {
                    block.fill(0);
                }
                trace!("page block served from free list");
                block
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                trace!(page_size = self.options.page_size, "page block allocated");
                vec![0u8; self.options.page_size].into_boxed_slice()
            }
        };

        let id = NEXT_POINTER_ID.fetch_add(1, Ordering::Relaxed);
        if self.options.track_allocations {
            self.outstanding.lock().insert(id);
        }

        Pointer {
            id,
            block: Arc::new(RwLock::new(block)),
        }
    }

    /// Return a block to the pool
    ///
    /// The block is recycled only when no view still aliases it; otherwise it
    /// is freed once the last view is dropped.
    pub fn release(&self, pointer: Pointer) {
        if self.options.track_allocations && !self.outstanding.lock().remove(&pointer.id) {
            warn!(block = pointer.id, "release of a block this pool does not track");
            return;
        }

        match Arc::try_unwrap(pointer.block) {
            Ok(lock) => {
                let block = lock.into_inner();
                if block.len() != self.options.page_size {
                    warn!(
                        block = pointer.id,
                        len = block.len(),
                        page_size = self.options.page_size,
                        "released block has the wrong size, dropping it"
                    );
                    return;
                }
                let mut free = self.free.lock();
                if free.len() < self.options.max_pooled_blocks {
                    free.push(block);
                }
            }
            Err(_) => {
                trace!(block = pointer.id, "released block still aliased by a view");
            }
        }
    }

    /// Drop every pooled block and forget outstanding ones
    pub fn clear(&self) {
        let pooled = {
            let mut free = self.free.lock();
            let n = free.len();
            free.clear();
            n
        };
        let outstanding = {
            let mut outstanding = self.outstanding.lock();
            let n = outstanding.len();
            outstanding.clear();
            n
        };
        if outstanding > 0 {
            warn!(outstanding, "page buffer pool cleared with blocks still in use");
        }
        debug!(pooled, "page buffer pool cleared");
    }

    /// Current pool counters
    pub fn stats(&self) -> PoolStats {
        let allocated_blocks = self.allocated.load(Ordering::Relaxed);
        PoolStats {
            allocated_blocks,
            reused_blocks: self.reused.load(Ordering::Relaxed),
            pooled_blocks: self.free.lock().len(),
            outstanding_blocks: self.outstanding.lock().len(),
            allocated_bytes: allocated_blocks * self.options.page_size as u64,
        }
    }
}

impl std::fmt::Debug for PageBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBufferPool")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}
