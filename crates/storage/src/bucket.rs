//! B-tree bucket: one index node laid out as a slotted page
//!
//! # Page Layout
//!
//! All integers are little-endian, all offsets page-relative.
//!
//! ```text
//! offset  size  field
//! 0       4     free pointer: first byte of the cell heap (page size when empty)
//! 4       4     entry count
//! 8       8     right sibling page index (-1 = none)
//! 16      1     is-leaf flag
//! 17      4*n   entry directory: cell offset per entry, ascending key order
//! ...           free space, always zero
//! fp..end       cell heap
//! ```
//!
//! Cells are kept in directory order from the tail: cell 0 ends at the page
//! end and cell `n-1` starts at the free pointer. A cell's length is the
//! distance to its predecessor's offset, so it is never stored.
//!
//! - leaf cell: `[key length: u16][key][value]`
//! - non-leaf cell: `[left child: u32][right child: u32][key]`
//!
//! The page image is a function of the header and the ordered cell list
//! alone. That is what lets every page operation undo and redo byte-for-byte
//! regardless of what else the page holds.
//!
//! # Logging
//!
//! Every successful public mutation appends exactly one page operation to the
//! owning [`CacheEntry`]. A mutation that fails, or an insert that does not
//! fit (`Ok(false)`), leaves both the page and the operation list untouched.

use crate::cache::CacheEntry;
use crate::page::DurablePage;
use crate::po::{
    AddLeafEntryPO, AddNonLeafEntryPO, PageOperation, PageOperationHeader, RemoveLeafEntryPO,
    RemoveNonLeafEntryPO, SetRightSiblingPO, ShrinkPO, UpdateValuePO,
};
use cellbtree_core::{BinaryCodec, Error, Result};
use std::ops::Range;
use tracing::trace;

const FREE_POINTER_OFFSET: usize = 0;
const SIZE_OFFSET: usize = 4;
const RIGHT_SIBLING_OFFSET: usize = 8;
const IS_LEAF_OFFSET: usize = 16;
const POSITIONS_ARRAY_OFFSET: usize = 17;

const SLOT_SIZE: usize = 4;
const KEY_LENGTH_SIZE: usize = 2;
const CHILD_POINTER_SIZE: usize = 4;
const NON_LEAF_PREFIX_SIZE: usize = 2 * CHILD_POINTER_SIZE;

const NO_SIBLING: i64 = -1;

/// Bytes taken by the bucket header before the entry directory
pub const BUCKET_HEADER_SIZE: usize = POSITIONS_ARRAY_OFFSET;

/// Smallest page a bucket can be formatted on
pub const MIN_PAGE_SIZE: usize = 64;

/// Decoded content of one bucket entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketEntry<V> {
    /// Leaf entry: serialized key and decoded value
    Leaf {
        /// Serialized key
        key: Vec<u8>,
        /// Decoded value
        value: V,
    },
    /// Non-leaf entry: separator key and the children around it
    NonLeaf {
        /// Page index of the child holding keys below `key`
        left_child: u32,
        /// Page index of the child holding keys from `key` up
        right_child: u32,
        /// Serialized separator key
        key: Vec<u8>,
    },
}

fn leaf_cell(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let key_len = u16::try_from(key.len()).map_err(|_| {
        Error::InvalidArgument(format!("key of {} bytes exceeds {} bytes", key.len(), u16::MAX))
    })?;
    let mut cell = Vec::with_capacity(KEY_LENGTH_SIZE + key.len() + value.len());
    cell.extend_from_slice(&key_len.to_le_bytes());
    cell.extend_from_slice(key);
    cell.extend_from_slice(value);
    Ok(cell)
}

fn non_leaf_cell(left_child: u32, right_child: u32, key: &[u8]) -> Vec<u8> {
    let mut cell = Vec::with_capacity(NON_LEAF_PREFIX_SIZE + key.len());
    cell.extend_from_slice(&left_child.to_le_bytes());
    cell.extend_from_slice(&right_child.to_le_bytes());
    cell.extend_from_slice(key);
    cell
}

fn encode_sibling(sibling: Option<u64>) -> Result<i64> {
    match sibling {
        None => Ok(NO_SIBLING),
        Some(page_index) => i64::try_from(page_index).map_err(|_| {
            Error::InvalidArgument(format!("sibling page index {} out of range", page_index))
        }),
    }
}

fn decode_sibling(raw: i64) -> Option<u64> {
    u64::try_from(raw).ok()
}

#[inline]
fn directory_end(count: usize) -> usize {
    POSITIONS_ARRAY_OFFSET + count * SLOT_SIZE
}

// ============================================================================
// Layout: reads
// ============================================================================

impl<B: AsRef<[u8]>> DurablePage<B> {
    fn entry_count(&self) -> usize {
        self.get_u32(SIZE_OFFSET) as usize
    }

    fn free_pointer(&self) -> usize {
        self.get_u32(FREE_POINTER_OFFSET) as usize
    }

    fn leaf_flag(&self) -> bool {
        self.get_u8(IS_LEAF_OFFSET) > 0
    }

    fn slot(&self, index: usize) -> usize {
        self.get_u32(POSITIONS_ARRAY_OFFSET + index * SLOT_SIZE) as usize
    }

    fn free_space(&self) -> usize {
        self.free_pointer()
            .saturating_sub(directory_end(self.entry_count()))
    }

    fn fits(&self, cell_len: usize) -> bool {
        cell_len + SLOT_SIZE <= self.free_space()
    }

    fn ensure_kind(&self, leaf: bool) -> Result<()> {
        if self.leaf_flag() != leaf {
            return Err(Error::WrongBucketKind {
                expected_leaf: leaf,
            });
        }
        Ok(())
    }

    fn check_header(&self) -> Result<()> {
        let count = self.entry_count();
        let free_pointer = self.free_pointer();
        if directory_end(count) > free_pointer || free_pointer > self.len() {
            return Err(Error::Corruption(format!(
                "bucket header inconsistent: {} entries, free pointer {}, page size {}",
                count,
                free_pointer,
                self.len()
            )));
        }
        Ok(())
    }

    /// Full walk of the directory; mutations rely on it before doing offset arithmetic.
    fn check_directory(&self) -> Result<()> {
        self.check_header()?;
        let min_cell = if self.leaf_flag() {
            KEY_LENGTH_SIZE
        } else {
            NON_LEAF_PREFIX_SIZE
        };
        let mut end = self.len();
        for index in 0..self.entry_count() {
            let start = self.slot(index);
            if start > end || end - start < min_cell {
                return Err(Error::Corruption(format!(
                    "cell {} at {}..{} breaks the heap order",
                    index, start, end
                )));
            }
            end = start;
        }
        if end != self.free_pointer() {
            return Err(Error::Corruption(format!(
                "cell heap ends at {} but free pointer is {}",
                end,
                self.free_pointer()
            )));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let size = self.entry_count();
        if index >= size {
            return Err(Error::IndexOutOfBounds { index, size });
        }
        Ok(())
    }

    /// Offset one past the last byte of cell `index`; `index` may equal the count.
    fn cell_end(&self, index: usize) -> usize {
        if index == 0 {
            self.len()
        } else {
            self.slot(index - 1)
        }
    }

    fn cell_range(&self, index: usize) -> Result<Range<usize>> {
        self.check_index(index)?;
        self.check_header()?;
        let start = self.slot(index);
        let end = self.cell_end(index);
        if start < self.free_pointer() || start > end || end > self.len() {
            return Err(Error::Corruption(format!(
                "cell {} spans {}..{} outside the heap {}..{}",
                index,
                start,
                end,
                self.free_pointer(),
                self.len()
            )));
        }
        Ok(start..end)
    }

    fn leaf_parts(&self, index: usize) -> Result<(Range<usize>, Range<usize>)> {
        let cell = self.cell_range(index)?;
        if cell.len() < KEY_LENGTH_SIZE {
            return Err(Error::Corruption(format!("leaf cell {} too short", index)));
        }
        let key_start = cell.start + KEY_LENGTH_SIZE;
        let key_end = key_start + self.get_u16(cell.start) as usize;
        if key_end > cell.end {
            return Err(Error::Corruption(format!(
                "leaf cell {} key overruns the cell",
                index
            )));
        }
        Ok((key_start..key_end, key_end..cell.end))
    }

    fn non_leaf_parts(&self, index: usize) -> Result<(u32, u32, Range<usize>)> {
        let cell = self.cell_range(index)?;
        if cell.len() < NON_LEAF_PREFIX_SIZE {
            return Err(Error::Corruption(format!(
                "non-leaf cell {} too short",
                index
            )));
        }
        let left = self.get_u32(cell.start);
        let right = self.get_u32(cell.start + CHILD_POINTER_SIZE);
        Ok((left, right, cell.start + NON_LEAF_PREFIX_SIZE..cell.end))
    }

    /// A separator spliced in at `index` between two neighbours needs them to
    /// share a child; otherwise the single logged `prev_child` cannot restore both.
    fn check_splice_chain(&self, index: usize) -> Result<()> {
        if index > 0 && index < self.entry_count() {
            let preceding_right = self.non_leaf_parts(index - 1)?.1;
            let following_left = self.non_leaf_parts(index)?.0;
            if preceding_right != following_left {
                return Err(Error::BrokenChildChain { index });
            }
        }
        Ok(())
    }

    /// Removing separator `index` requires each neighbour to point at the
    /// child it shares with the removed entry.
    fn check_removal_chain(&self, index: usize, left_child: u32, right_child: u32) -> Result<()> {
        if index > 0 && self.non_leaf_parts(index - 1)?.1 != left_child {
            return Err(Error::BrokenChildChain { index });
        }
        if index + 1 < self.entry_count() && self.non_leaf_parts(index + 1)?.0 != right_child {
            return Err(Error::BrokenChildChain { index });
        }
        Ok(())
    }

    /// Chain pointer shared by the neighbours of a separator about to be
    /// inserted at `index`.
    fn shared_child(&self, index: usize) -> Result<Option<u32>> {
        let count = self.entry_count();
        if index < count {
            Ok(Some(self.non_leaf_parts(index)?.0))
        } else if index > 0 {
            Ok(Some(self.non_leaf_parts(index - 1)?.1))
        } else {
            Ok(None)
        }
    }
}

// ============================================================================
// Layout: writes
// ============================================================================

impl<B: AsRef<[u8]> + AsMut<[u8]>> DurablePage<B> {
    fn set_slot(&mut self, index: usize, offset: usize) {
        self.set_u32(POSITIONS_ARRAY_OFFSET + index * SLOT_SIZE, offset as u32);
    }

    fn format(&mut self, is_leaf: bool) {
        let len = self.len();
        self.zero(0, len);
        self.set_u32(FREE_POINTER_OFFSET, len as u32);
        self.set_u32(SIZE_OFFSET, 0);
        self.set_i64(RIGHT_SIBLING_OFFSET, NO_SIBLING);
        self.set_u8(IS_LEAF_OFFSET, u8::from(is_leaf));
    }

    fn insert_cell(&mut self, index: usize, cell: &[u8]) -> Result<()> {
        self.check_directory()?;
        let count = self.entry_count();
        if index > count {
            return Err(Error::IndexOutOfBounds { index, size: count });
        }
        let required = cell.len() + SLOT_SIZE;
        let available = self.free_space();
        if required > available {
            return Err(Error::ReplayOverflow {
                required,
                available,
            });
        }

        let len = cell.len();
        let free_pointer = self.free_pointer();
        let end = self.cell_end(index);

        // cells index.. slide toward the directory to open a gap
        self.move_data(free_pointer, free_pointer - len, end - free_pointer);
        self.set_bytes(end - len, cell);

        for j in (index..count).rev() {
            let shifted = self.slot(j) - len;
            self.set_slot(j + 1, shifted);
        }
        self.set_slot(index, end - len);

        self.set_u32(FREE_POINTER_OFFSET, (free_pointer - len) as u32);
        self.set_u32(SIZE_OFFSET, (count + 1) as u32);
        Ok(())
    }

    fn remove_cell(&mut self, index: usize) -> Result<Vec<u8>> {
        self.check_directory()?;
        let count = self.entry_count();
        let cell = self.cell_range(index)?;
        let len = cell.len();
        let removed = self.get_bytes(cell.start, len).to_vec();
        let free_pointer = self.free_pointer();

        self.move_data(free_pointer, free_pointer + len, cell.start - free_pointer);
        self.zero(free_pointer, len);

        for j in index + 1..count {
            let shifted = self.slot(j) + len;
            self.set_slot(j - 1, shifted);
        }
        self.set_slot(count - 1, 0);

        self.set_u32(FREE_POINTER_OFFSET, (free_pointer + len) as u32);
        self.set_u32(SIZE_OFFSET, (count - 1) as u32);
        Ok(removed)
    }

    fn remove_cell_matching(&mut self, index: usize, expected: &[u8]) -> Result<()> {
        let cell = self.cell_range(index)?;
        if &self.as_bytes()[cell] != expected {
            return Err(Error::EntryMismatch { index });
        }
        self.remove_cell(index)?;
        Ok(())
    }

    fn truncate_cells(&mut self, new_size: usize) -> Result<Vec<Vec<u8>>> {
        self.check_directory()?;
        let count = self.entry_count();
        if new_size > count {
            return Err(Error::InvalidArgument(format!(
                "cannot shrink {} entries to {}",
                count, new_size
            )));
        }

        let removed = (new_size..count)
            .map(|index| {
                self.cell_range(index)
                    .map(|cell| self.as_bytes()[cell].to_vec())
            })
            .collect::<Result<Vec<_>>>()?;

        let free_pointer = self.free_pointer();
        let new_free_pointer = self.cell_end(new_size);
        self.zero(free_pointer, new_free_pointer - free_pointer);
        self.zero(directory_end(new_size), (count - new_size) * SLOT_SIZE);

        self.set_u32(FREE_POINTER_OFFSET, new_free_pointer as u32);
        self.set_u32(SIZE_OFFSET, new_size as u32);
        Ok(removed)
    }

    fn append_cells(&mut self, cells: &[Vec<u8>]) -> Result<()> {
        self.check_directory()?;
        let required: usize = cells.iter().map(|cell| cell.len() + SLOT_SIZE).sum();
        let available = self.free_space();
        if required > available {
            return Err(Error::ReplayOverflow {
                required,
                available,
            });
        }
        for cell in cells {
            let count = self.entry_count();
            self.insert_cell(count, cell)?;
        }
        Ok(())
    }

    fn set_left_child(&mut self, index: usize, child: u32) {
        let offset = self.slot(index);
        self.set_u32(offset, child);
    }

    fn set_right_child(&mut self, index: usize, child: u32) {
        let offset = self.slot(index) + CHILD_POINTER_SIZE;
        self.set_u32(offset, child);
    }

    /// Point the neighbours of the separator just inserted at `index` at its children.
    fn splice_children(&mut self, index: usize, left_child: u32, right_child: u32) {
        let count = self.entry_count();
        if index > 0 {
            self.set_right_child(index - 1, left_child);
        }
        if index + 1 < count {
            self.set_left_child(index + 1, right_child);
        }
    }

    /// Join the neighbours of the separator just removed from `index` through `child`.
    fn collapse_children(&mut self, index: usize, child: u32) {
        let count = self.entry_count();
        if index > 0 {
            self.set_right_child(index - 1, child);
        }
        if index < count {
            self.set_left_child(index, child);
        }
    }

    fn overwrite_value(&mut self, index: usize, key_size: usize, value: &[u8]) -> Result<Vec<u8>> {
        self.ensure_kind(true)?;
        let (key, stored) = self.leaf_parts(index)?;
        if key.len() != key_size {
            return Err(Error::KeySizeMismatch {
                expected: key.len(),
                actual: key_size,
            });
        }
        if stored.len() != value.len() {
            return Err(Error::ValueSizeMismatch {
                expected: stored.len(),
                actual: value.len(),
            });
        }
        let previous = self.as_bytes()[stored.clone()].to_vec();
        self.set_bytes(stored.start, value);
        Ok(previous)
    }
}

// ============================================================================
// Bucket
// ============================================================================

/// One B-tree node interpreted over a cache entry
///
/// The bucket does no key comparison: callers pass ordinal positions found by
/// their own search and are responsible for keeping keys ordered.
pub struct Bucket<'a> {
    entry: &'a mut CacheEntry,
}

impl<'a> Bucket<'a> {
    /// Interpret `entry` as a bucket
    pub fn new(entry: &'a mut CacheEntry) -> Self {
        Bucket { entry }
    }

    fn read<R>(&self, f: impl FnOnce(&DurablePage<&[u8]>) -> Result<R>) -> Result<R> {
        let guard = self.entry.read();
        let page = DurablePage::new(&guard[..]);
        f(&page)
    }

    fn write<R>(&mut self, f: impl FnOnce(&mut DurablePage<&mut [u8]>) -> Result<R>) -> Result<R> {
        let mut guard = self.entry.write();
        let mut page = DurablePage::new(&mut guard[..]);
        f(&mut page)
    }

    fn header(&self) -> PageOperationHeader {
        PageOperationHeader::new(
            self.entry.file_id(),
            self.entry.page_index(),
            self.entry.operation_unit_id(),
        )
    }

    fn log(&mut self, operation: impl Into<PageOperation>) {
        self.entry.append_page_operation(operation.into());
    }

    // ------------------------------------------------------------------------
    // Header
    // ------------------------------------------------------------------------

    /// Format the page as an empty bucket
    ///
    /// The whole page is zeroed first so that free space starts out zero.
    pub fn init(&mut self, is_leaf: bool) -> Result<()> {
        self.write(|page| {
            if page.len() < MIN_PAGE_SIZE {
                return Err(Error::PageTooSmall {
                    size: page.len(),
                    minimum: MIN_PAGE_SIZE,
                });
            }
            if page.len() > u32::MAX as usize {
                return Err(Error::InvalidArgument(format!(
                    "page of {} bytes exceeds the 32-bit offset range",
                    page.len()
                )));
            }
            page.format(is_leaf);
            Ok(())
        })
    }

    /// Live entry count
    pub fn size(&self) -> usize {
        let guard = self.entry.read();
        DurablePage::new(&guard[..]).entry_count()
    }

    /// Whether the bucket holds no entries
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether this is a leaf bucket
    pub fn is_leaf(&self) -> bool {
        let guard = self.entry.read();
        DurablePage::new(&guard[..]).leaf_flag()
    }

    /// Right sibling page index
    pub fn right_sibling(&self) -> Option<u64> {
        let guard = self.entry.read();
        decode_sibling(DurablePage::new(&guard[..]).get_i64(RIGHT_SIBLING_OFFSET))
    }

    /// Bytes available for new cells and their directory slots
    pub fn free_space(&self) -> usize {
        let guard = self.entry.read();
        DurablePage::new(&guard[..]).free_space()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Decode the value of leaf entry `index`
    pub fn get_value<V, C>(&self, index: usize, codec: &C) -> Result<V>
    where
        C: BinaryCodec<V> + ?Sized,
    {
        self.read(|page| {
            page.ensure_kind(true)?;
            let (_, value) = page.leaf_parts(index)?;
            codec.deserialize(&page.as_bytes()[value], 0)
        })
    }

    /// Full content of entry `index`, decoding leaf values with `codec`
    pub fn get_entry<V, C>(&self, index: usize, codec: &C) -> Result<BucketEntry<V>>
    where
        C: BinaryCodec<V> + ?Sized,
    {
        self.read(|page| {
            if page.leaf_flag() {
                let (key, value) = page.leaf_parts(index)?;
                Ok(BucketEntry::Leaf {
                    key: page.as_bytes()[key].to_vec(),
                    value: codec.deserialize(&page.as_bytes()[value], 0)?,
                })
            } else {
                let (left_child, right_child, key) = page.non_leaf_parts(index)?;
                Ok(BucketEntry::NonLeaf {
                    left_child,
                    right_child,
                    key: page.as_bytes()[key].to_vec(),
                })
            }
        })
    }

    /// Decode the key of entry `index`
    pub fn key<K, C>(&self, index: usize, codec: &C) -> Result<K>
    where
        C: BinaryCodec<K> + ?Sized,
    {
        let raw = self.raw_key(index)?;
        codec.deserialize(&raw, 0)
    }

    /// Serialized key of entry `index`
    pub fn raw_key(&self, index: usize) -> Result<Vec<u8>> {
        self.read(|page| {
            let key = if page.leaf_flag() {
                page.leaf_parts(index)?.0
            } else {
                page.non_leaf_parts(index)?.2
            };
            Ok(page.as_bytes()[key].to_vec())
        })
    }

    /// Serialized value of leaf entry `index`
    pub fn raw_value(&self, index: usize) -> Result<Vec<u8>> {
        self.read(|page| {
            page.ensure_kind(true)?;
            let (_, value) = page.leaf_parts(index)?;
            Ok(page.as_bytes()[value].to_vec())
        })
    }

    /// Raw cell bytes of entry `index`
    pub fn raw_entry(&self, index: usize) -> Result<Vec<u8>> {
        self.read(|page| {
            let cell = page.cell_range(index)?;
            Ok(page.as_bytes()[cell].to_vec())
        })
    }

    /// Left child of separator `index`
    pub fn left_child(&self, index: usize) -> Result<u32> {
        self.read(|page| {
            page.ensure_kind(false)?;
            Ok(page.non_leaf_parts(index)?.0)
        })
    }

    /// Right child of separator `index`
    pub fn right_child(&self, index: usize) -> Result<u32> {
        self.read(|page| {
            page.ensure_kind(false)?;
            Ok(page.non_leaf_parts(index)?.1)
        })
    }

    // ------------------------------------------------------------------------
    // Logged mutations
    // ------------------------------------------------------------------------

    /// Insert a leaf entry at ordinal `index`
    ///
    /// Returns `Ok(false)` without touching the page when the entry does not fit.
    pub fn add_leaf_entry(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<bool> {
        let cell = leaf_cell(key, value)?;
        let inserted = self.write(|page| {
            page.ensure_kind(true)?;
            let size = page.entry_count();
            if index > size {
                return Err(Error::IndexOutOfBounds { index, size });
            }
            page.check_header()?;
            if !page.fits(cell.len()) {
                trace!(
                    index,
                    cell = cell.len(),
                    free = page.free_space(),
                    "leaf entry does not fit"
                );
                return Ok(false);
            }
            page.insert_cell(index, &cell)?;
            Ok(true)
        })?;

        if inserted {
            let header = self.header();
            self.log(AddLeafEntryPO {
                header,
                index,
                key: key.to_vec(),
                value: value.to_vec(),
            });
        }
        Ok(inserted)
    }

    /// Remove leaf entry `index`
    ///
    /// `key` and `value` must be the bytes currently stored there; they are
    /// carried by the logged operation so it can be undone. Returns the new size.
    pub fn remove_leaf_entry(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<usize> {
        let expected = leaf_cell(key, value)?;
        let size = self.write(|page| {
            page.ensure_kind(true)?;
            page.remove_cell_matching(index, &expected)?;
            Ok(page.entry_count())
        })?;

        let header = self.header();
        self.log(RemoveLeafEntryPO {
            header,
            index,
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(size)
    }

    /// Insert a separator at ordinal `index`
    ///
    /// With `update_neighbours`, the preceding separator's right child becomes
    /// `left_child` and the following separator's left child becomes
    /// `right_child`; both neighbours must share a child beforehand
    /// ([`Error::BrokenChildChain`] otherwise). Returns `Ok(false)` without
    /// touching the page when the entry does not fit.
    pub fn add_non_leaf_entry(
        &mut self,
        index: usize,
        left_child: u32,
        right_child: u32,
        key: &[u8],
        update_neighbours: bool,
    ) -> Result<bool> {
        let cell = non_leaf_cell(left_child, right_child, key);
        let outcome = self.write(|page| {
            page.ensure_kind(false)?;
            let size = page.entry_count();
            if index > size {
                return Err(Error::IndexOutOfBounds { index, size });
            }
            page.check_header()?;
            if update_neighbours {
                page.check_splice_chain(index)?;
            }
            if !page.fits(cell.len()) {
                trace!(
                    index,
                    cell = cell.len(),
                    free = page.free_space(),
                    "separator does not fit"
                );
                return Ok(None);
            }
            let prev_child = if update_neighbours {
                page.shared_child(index)?
            } else {
                None
            };
            page.insert_cell(index, &cell)?;
            if update_neighbours {
                page.splice_children(index, left_child, right_child);
            }
            Ok(Some(prev_child))
        })?;

        match outcome {
            None => Ok(false),
            Some(prev_child) => {
                let header = self.header();
                self.log(AddNonLeafEntryPO {
                    header,
                    index,
                    key: key.to_vec(),
                    update_neighbours,
                    left_child,
                    right_child,
                    prev_child,
                });
                Ok(true)
            }
        }
    }

    /// Remove separator `index`
    ///
    /// When entries remain, the preceding separator's right child and the
    /// following separator's left child become `prev_child`. `key` must be the
    /// stored separator key, and the neighbours must point at the removed
    /// separator's children ([`Error::BrokenChildChain`] otherwise). Returns
    /// the new size.
    pub fn remove_non_leaf_entry(
        &mut self,
        index: usize,
        key: &[u8],
        prev_child: u32,
    ) -> Result<usize> {
        let (left_child, right_child, size) = self.write(|page| {
            page.ensure_kind(false)?;
            let (left, right, stored_key) = page.non_leaf_parts(index)?;
            if &page.as_bytes()[stored_key] != key {
                return Err(Error::EntryMismatch { index });
            }
            page.check_removal_chain(index, left, right)?;
            page.remove_cell(index)?;
            page.collapse_children(index, prev_child);
            Ok((left, right, page.entry_count()))
        })?;

        let header = self.header();
        self.log(RemoveNonLeafEntryPO {
            header,
            index,
            prev_child,
            key: key.to_vec(),
            left_child,
            right_child,
        });
        Ok(size)
    }

    /// Overwrite the value of leaf entry `index` in place
    ///
    /// Only same-length values are accepted; `key_size` is the serialized
    /// length of the stored key.
    pub fn update_value(&mut self, index: usize, value: &[u8], key_size: usize) -> Result<()> {
        let prev_value = self.write(|page| page.overwrite_value(index, key_size, value))?;

        let header = self.header();
        self.log(UpdateValuePO {
            header,
            index,
            key_size,
            prev_value,
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Set the right sibling page index
    pub fn set_right_sibling(&mut self, sibling: Option<u64>) -> Result<()> {
        let raw = encode_sibling(sibling)?;
        let prev_right_sibling = self.write(|page| {
            let prev = page.get_i64(RIGHT_SIBLING_OFFSET);
            page.set_i64(RIGHT_SIBLING_OFFSET, raw);
            Ok(decode_sibling(prev))
        })?;

        let header = self.header();
        self.log(SetRightSiblingPO {
            header,
            prev_right_sibling,
            right_sibling: sibling,
        });
        Ok(())
    }

    /// Keep the first `new_size` entries and discard the rest
    ///
    /// The discarded cells are logged verbatim so an undo restores their exact
    /// bytes, encrypted keys included.
    pub fn shrink<K, C>(&mut self, new_size: usize, encrypted: bool, key_codec: &C) -> Result<()>
    where
        C: BinaryCodec<K> + ?Sized,
    {
        let removed_records = self.write(|page| page.truncate_cells(new_size))?;

        let header = self.header();
        self.log(ShrinkPO {
            header,
            new_size,
            removed_records,
            encrypted,
            key_serializer_id: key_codec.id(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Replay primitives (unlogged)
    // ------------------------------------------------------------------------

    pub(crate) fn apply_insert_leaf(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<()> {
        let cell = leaf_cell(key, value)?;
        self.write(|page| {
            page.ensure_kind(true)?;
            page.insert_cell(index, &cell)
        })
    }

    pub(crate) fn apply_remove_leaf(&mut self, index: usize, key: &[u8], value: &[u8]) -> Result<()> {
        let expected = leaf_cell(key, value)?;
        self.write(|page| {
            page.ensure_kind(true)?;
            page.remove_cell_matching(index, &expected)
        })
    }

    pub(crate) fn apply_insert_non_leaf(
        &mut self,
        index: usize,
        left_child: u32,
        right_child: u32,
        key: &[u8],
        update_neighbours: bool,
    ) -> Result<()> {
        let cell = non_leaf_cell(left_child, right_child, key);
        self.write(|page| {
            page.ensure_kind(false)?;
            page.insert_cell(index, &cell)?;
            if update_neighbours {
                page.splice_children(index, left_child, right_child);
            }
            Ok(())
        })
    }

    pub(crate) fn apply_remove_non_leaf(
        &mut self,
        index: usize,
        left_child: u32,
        right_child: u32,
        key: &[u8],
        neighbour_child: Option<u32>,
    ) -> Result<()> {
        let expected = non_leaf_cell(left_child, right_child, key);
        self.write(|page| {
            page.ensure_kind(false)?;
            page.remove_cell_matching(index, &expected)?;
            if let Some(child) = neighbour_child {
                page.collapse_children(index, child);
            }
            Ok(())
        })
    }

    pub(crate) fn apply_value(&mut self, index: usize, key_size: usize, value: &[u8]) -> Result<()> {
        self.write(|page| page.overwrite_value(index, key_size, value).map(|_| ()))
    }

    pub(crate) fn apply_right_sibling(&mut self, sibling: Option<u64>) -> Result<()> {
        let raw = encode_sibling(sibling)?;
        self.write(|page| {
            page.set_i64(RIGHT_SIBLING_OFFSET, raw);
            Ok(())
        })
    }

    pub(crate) fn apply_truncate(&mut self, new_size: usize, removed: usize) -> Result<()> {
        self.write(|page| {
            let size = page.entry_count();
            if size != new_size + removed {
                return Err(Error::Corruption(format!(
                    "shrink to {} dropping {} entries replayed on a bucket of {}",
                    new_size, removed, size
                )));
            }
            page.truncate_cells(new_size).map(|_| ())
        })
    }

    /// Append raw cells after the last entry
    pub(crate) fn add_all(&mut self, records: &[Vec<u8>]) -> Result<()> {
        self.write(|page| page.append_cells(records))
    }
}
