//! Separator insert and remove
//!
//! Separators form a chain: the right child of entry `i` is the left child of
//! entry `i + 1`. Both operations carry the single child pointer shared across
//! the affected position, which is all an inverse needs to re-link the chain.

use super::stream::{bytes_size, StreamReader, StreamWriter};
use super::{PageOperationHeader, PageOperationKind, PageOperationRecord};
use crate::bucket::Bucket;
use crate::cache::CacheEntry;
use cellbtree_core::Result;

/// Separator inserted at `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNonLeafEntryPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Ordinal position of the new separator
    pub index: usize,
    /// Serialized separator key
    pub key: Vec<u8>,
    /// Whether the neighbours were re-pointed at the new children
    pub update_neighbours: bool,
    /// Left child of the new separator
    pub left_child: u32,
    /// Right child of the new separator
    pub right_child: u32,
    /// Child pointer the neighbours shared before the insert; `None` when
    /// there were no neighbours or they were left alone
    pub prev_child: Option<u32>,
}

impl PageOperationRecord for AddNonLeafEntryPO {
    const KIND: PageOperationKind = PageOperationKind::AddNonLeafEntry;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_insert_non_leaf(
            self.index,
            self.left_child,
            self.right_child,
            &self.key,
            self.update_neighbours,
        )
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        let neighbour_child = if self.update_neighbours {
            self.prev_child
        } else {
            None
        };
        Bucket::new(entry).apply_remove_non_leaf(
            self.index,
            self.left_child,
            self.right_child,
            &self.key,
            neighbour_child,
        )
    }

    fn payload_size(&self) -> usize {
        4 + bytes_size(self.key.len()) + 1 + 4 + 4 + 8
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.index);
        writer.put_bytes(&self.key);
        writer.put_bool(self.update_neighbours);
        writer.put_u32(self.left_child);
        writer.put_u32(self.right_child);
        writer.put_optional_child(self.prev_child);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(AddNonLeafEntryPO {
            header,
            index: reader.get_index()?,
            key: reader.get_bytes()?,
            update_neighbours: reader.get_bool()?,
            left_child: reader.get_u32()?,
            right_child: reader.get_u32()?,
            prev_child: reader.get_optional_child()?,
        })
    }
}

/// Separator removed from `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveNonLeafEntryPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Ordinal position of the removed separator
    pub index: usize,
    /// Child the neighbours were joined through
    pub prev_child: u32,
    /// Removed separator key
    pub key: Vec<u8>,
    /// Left child of the removed separator
    pub left_child: u32,
    /// Right child of the removed separator
    pub right_child: u32,
}

impl PageOperationRecord for RemoveNonLeafEntryPO {
    const KIND: PageOperationKind = PageOperationKind::RemoveNonLeafEntry;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_remove_non_leaf(
            self.index,
            self.left_child,
            self.right_child,
            &self.key,
            Some(self.prev_child),
        )
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_insert_non_leaf(
            self.index,
            self.left_child,
            self.right_child,
            &self.key,
            true,
        )
    }

    fn payload_size(&self) -> usize {
        4 + 4 + bytes_size(self.key.len()) + 4 + 4
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.index);
        writer.put_u32(self.prev_child);
        writer.put_bytes(&self.key);
        writer.put_u32(self.left_child);
        writer.put_u32(self.right_child);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(RemoveNonLeafEntryPO {
            header,
            index: reader.get_index()?,
            prev_child: reader.get_u32()?,
            key: reader.get_bytes()?,
            left_child: reader.get_u32()?,
            right_child: reader.get_u32()?,
        })
    }
}
