//! Cache pages: pooled blocks with page identity
//!
//! - [`CachePointer`]: a pool block bound to (file id, page index)
//! - [`BufferView`]: independent-cursor view over the same bytes
//! - [`CacheEntry`]: the unit buckets mutate; owns the pending page operations
//!
//! Views alias the page storage, they never copy it. A reader holding a view
//! sees every write made through the owning entry.

use crate::po::PageOperation;
use crate::pool::{PageBlock, Pointer};
use cellbtree_core::types::{FileId, OperationUnitId, PageId, PageIndex};
use cellbtree_core::{Error, Result};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

// ============================================================================
// CachePointer
// ============================================================================

/// A pooled block bound to a page identity
#[derive(Debug)]
pub struct CachePointer {
    pointer: Pointer,
    page_id: PageId,
}

impl CachePointer {
    /// Bind `pointer` to page `page_index` of file `file_id`
    pub fn new(pointer: Pointer, file_id: FileId, page_index: PageIndex) -> Self {
        CachePointer {
            pointer,
            page_id: PageId::new(file_id, page_index),
        }
    }

    /// File the page belongs to
    pub fn file_id(&self) -> FileId {
        self.page_id.file_id
    }

    /// Index of the page in its file
    pub fn page_index(&self) -> PageIndex {
        self.page_id.page_index
    }

    /// Full page identity
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Underlying pool block
    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Give the block back, e.g. to release it to its pool
    pub fn into_pointer(self) -> Pointer {
        self.pointer
    }

    /// Independent-cursor view over the page bytes, positioned at 0
    pub fn buffer_duplicate(&self) -> BufferView {
        BufferView {
            block: self.pointer.shared(),
            position: 0,
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.pointer.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.pointer.write()
    }
}

// ============================================================================
// BufferView
// ============================================================================

/// View over shared page storage with its own read/write cursor
///
/// Moving the cursor of one view never affects another view or the owning
/// cache entry. Bytes are shared, not copied.
#[derive(Clone)]
pub struct BufferView {
    block: Arc<PageBlock>,
    position: usize,
}

impl BufferView {
    /// Total length of the underlying page
    pub fn len(&self) -> usize {
        self.block.read().len()
    }

    /// Whether the underlying page has zero length
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor; `position` may equal the length but not exceed it
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        let len = self.len();
        if position > len {
            return Err(Error::InvalidArgument(format!(
                "position {} beyond view length {}",
                position, len
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Move the cursor back to 0
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Bytes between the cursor and the end of the page
    pub fn remaining(&self) -> usize {
        self.len() - self.position
    }

    /// Whether two views alias the same page storage
    pub fn shares_storage_with(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.block, &other.block)
    }

    /// Read `dst.len()` bytes at the cursor and advance it
    pub fn get(&mut self, dst: &mut [u8]) -> Result<()> {
        let block = self.block.read();
        let have = block.len() - self.position;
        if have < dst.len() {
            return Err(Error::Truncated {
                needed: dst.len(),
                have,
            });
        }
        dst.copy_from_slice(&block[self.position..self.position + dst.len()]);
        self.position += dst.len();
        Ok(())
    }

    /// Write `src` at the cursor and advance it
    pub fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        let mut block = self.block.write();
        let have = block.len() - self.position;
        if have < src.len() {
            return Err(Error::Truncated {
                needed: src.len(),
                have,
            });
        }
        block[self.position..self.position + src.len()].copy_from_slice(src);
        self.position += src.len();
        Ok(())
    }

    /// Copy every remaining byte of `src` to this view, advancing both cursors
    pub fn put(&mut self, src: &mut BufferView) -> Result<()> {
        let mut bytes = vec![0u8; src.remaining()];
        src.get(&mut bytes)?;
        if let Err(err) = self.put_slice(&bytes) {
            src.position -= bytes.len();
            return Err(err);
        }
        Ok(())
    }

    /// Snapshot of the whole page, independent of the cursor
    pub fn to_vec(&self) -> Vec<u8> {
        self.block.read().to_vec()
    }
}

impl std::fmt::Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("position", &self.position)
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// CacheEntry
// ============================================================================

/// A page as seen by buckets and page operations
///
/// The entry owns the list of page operations produced by mutations since the
/// last flush. Each successful bucket mutation appends exactly one; the log
/// drains them with [`take_page_operations`](Self::take_page_operations).
#[derive(Debug)]
pub struct CacheEntry {
    cache_pointer: CachePointer,
    operation_unit_id: OperationUnitId,
    page_operations: Vec<PageOperation>,
}

impl CacheEntry {
    /// Wrap a cache pointer; the entry takes its page identity from it
    pub fn new(cache_pointer: CachePointer) -> Self {
        CacheEntry {
            cache_pointer,
            operation_unit_id: OperationUnitId::nil(),
            page_operations: Vec::new(),
        }
    }

    /// File the page belongs to
    pub fn file_id(&self) -> FileId {
        self.cache_pointer.file_id()
    }

    /// Index of the page in its file
    pub fn page_index(&self) -> PageIndex {
        self.cache_pointer.page_index()
    }

    /// Full page identity
    pub fn page_id(&self) -> PageId {
        self.cache_pointer.page_id()
    }

    /// Cache pointer holding the page bytes
    pub fn cache_pointer(&self) -> &CachePointer {
        &self.cache_pointer
    }

    /// Give the cache pointer back
    pub fn into_cache_pointer(self) -> CachePointer {
        self.cache_pointer
    }

    /// Independent-cursor view over the page bytes
    pub fn buffer_duplicate(&self) -> BufferView {
        self.cache_pointer.buffer_duplicate()
    }

    /// Operation unit stamped onto page operations created through this entry
    pub fn operation_unit_id(&self) -> OperationUnitId {
        self.operation_unit_id
    }

    /// Set the operation unit for subsequent mutations
    pub fn set_operation_unit_id(&mut self, operation_unit_id: OperationUnitId) {
        self.operation_unit_id = operation_unit_id;
    }

    /// Record a page operation
    pub fn append_page_operation(&mut self, operation: PageOperation) {
        self.page_operations.push(operation);
    }

    /// Page operations recorded since the last flush, oldest first
    pub fn page_operations(&self) -> &[PageOperation] {
        &self.page_operations
    }

    /// Forget recorded page operations
    pub fn clear_page_operations(&mut self) {
        self.page_operations.clear();
    }

    /// Remove and return recorded page operations, oldest first
    pub fn take_page_operations(&mut self) -> Vec<PageOperation> {
        std::mem::take(&mut self.page_operations)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.cache_pointer.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.cache_pointer.write()
    }
}
