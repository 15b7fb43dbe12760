//! Leaf entry insert and remove

use super::stream::{bytes_size, StreamReader, StreamWriter};
use super::{PageOperationHeader, PageOperationKind, PageOperationRecord};
use crate::bucket::Bucket;
use crate::cache::CacheEntry;
use cellbtree_core::Result;

/// Leaf entry inserted at `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddLeafEntryPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Ordinal position of the new entry
    pub index: usize,
    /// Serialized key
    pub key: Vec<u8>,
    /// Serialized value
    pub value: Vec<u8>,
}

impl PageOperationRecord for AddLeafEntryPO {
    const KIND: PageOperationKind = PageOperationKind::AddLeafEntry;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_insert_leaf(self.index, &self.key, &self.value)
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_remove_leaf(self.index, &self.key, &self.value)
    }

    fn payload_size(&self) -> usize {
        4 + bytes_size(self.key.len()) + bytes_size(self.value.len())
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.index);
        writer.put_bytes(&self.key);
        writer.put_bytes(&self.value);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(AddLeafEntryPO {
            header,
            index: reader.get_index()?,
            key: reader.get_bytes()?,
            value: reader.get_bytes()?,
        })
    }
}

/// Leaf entry removed from `index`; carries the removed key and value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveLeafEntryPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Ordinal position of the removed entry
    pub index: usize,
    /// Removed key
    pub key: Vec<u8>,
    /// Removed value
    pub value: Vec<u8>,
}

impl PageOperationRecord for RemoveLeafEntryPO {
    const KIND: PageOperationKind = PageOperationKind::RemoveLeafEntry;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_remove_leaf(self.index, &self.key, &self.value)
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_insert_leaf(self.index, &self.key, &self.value)
    }

    fn payload_size(&self) -> usize {
        4 + bytes_size(self.key.len()) + bytes_size(self.value.len())
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.index);
        writer.put_bytes(&self.key);
        writer.put_bytes(&self.value);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(RemoveLeafEntryPO {
            header,
            index: reader.get_index()?,
            key: reader.get_bytes()?,
            value: reader.get_bytes()?,
        })
    }
}
