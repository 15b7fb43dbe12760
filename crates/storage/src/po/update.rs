//! In-place updates: leaf value overwrite and right sibling change

use super::stream::{bytes_size, StreamReader, StreamWriter};
use super::{PageOperationHeader, PageOperationKind, PageOperationRecord};
use crate::bucket::Bucket;
use crate::cache::CacheEntry;
use cellbtree_core::Result;

/// Leaf value at `index` overwritten with a same-length value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateValuePO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Ordinal position of the entry
    pub index: usize,
    /// Serialized length of the entry's key
    pub key_size: usize,
    /// Value before the update
    pub prev_value: Vec<u8>,
    /// Value after the update
    pub value: Vec<u8>,
}

impl PageOperationRecord for UpdateValuePO {
    const KIND: PageOperationKind = PageOperationKind::UpdateValue;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_value(self.index, self.key_size, &self.value)
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_value(self.index, self.key_size, &self.prev_value)
    }

    fn payload_size(&self) -> usize {
        4 + 4 + bytes_size(self.prev_value.len()) + bytes_size(self.value.len())
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.index);
        writer.put_index(self.key_size);
        writer.put_bytes(&self.prev_value);
        writer.put_bytes(&self.value);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(UpdateValuePO {
            header,
            index: reader.get_index()?,
            key_size: reader.get_index()?,
            prev_value: reader.get_bytes()?,
            value: reader.get_bytes()?,
        })
    }
}

/// Right sibling pointer changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRightSiblingPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Sibling before the change
    pub prev_right_sibling: Option<u64>,
    /// Sibling after the change
    pub right_sibling: Option<u64>,
}

impl PageOperationRecord for SetRightSiblingPO {
    const KIND: PageOperationKind = PageOperationKind::SetRightSibling;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_right_sibling(self.right_sibling)
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_right_sibling(self.prev_right_sibling)
    }

    fn payload_size(&self) -> usize {
        8 + 8
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_optional_page(self.prev_right_sibling);
        writer.put_optional_page(self.right_sibling);
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        Ok(SetRightSiblingPO {
            header,
            prev_right_sibling: reader.get_optional_page()?,
            right_sibling: reader.get_optional_page()?,
        })
    }
}
