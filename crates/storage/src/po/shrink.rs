//! Tail truncation used by bucket splits

use super::stream::{bytes_size, StreamReader, StreamWriter};
use super::{PageOperationHeader, PageOperationKind, PageOperationRecord};
use crate::bucket::Bucket;
use crate::cache::CacheEntry;
use cellbtree_core::Result;

/// Entries from `new_size` onward removed
///
/// The removed cells are kept verbatim, in order. Keys inside them may be
/// encrypted; `encrypted` and `key_serializer_id` describe how, for consumers
/// that need to decode them. Replay never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkPO {
    /// Routing header
    pub header: PageOperationHeader,
    /// Entry count after the shrink
    pub new_size: usize,
    /// Raw cells removed, in directory order
    pub removed_records: Vec<Vec<u8>>,
    /// Whether keys were stored encrypted
    pub encrypted: bool,
    /// Id of the key codec in use
    pub key_serializer_id: u8,
}

impl PageOperationRecord for ShrinkPO {
    const KIND: PageOperationKind = PageOperationKind::Shrink;

    fn header(&self) -> &PageOperationHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut PageOperationHeader {
        &mut self.header
    }

    fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        Bucket::new(entry).apply_truncate(self.new_size, self.removed_records.len())
    }

    fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        self.header.ensure_routed(entry)?;
        let mut bucket = Bucket::new(entry);
        bucket.apply_truncate(self.new_size, 0)?;
        bucket.add_all(&self.removed_records)
    }

    fn payload_size(&self) -> usize {
        4 + 1
            + 1
            + 4
            + self
                .removed_records
                .iter()
                .map(|record| bytes_size(record.len()))
                .sum::<usize>()
    }

    fn write_payload(&self, writer: &mut StreamWriter<'_>) {
        writer.put_index(self.new_size);
        writer.put_bool(self.encrypted);
        writer.put_u8(self.key_serializer_id);
        writer.put_index(self.removed_records.len());
        for record in &self.removed_records {
            writer.put_bytes(record);
        }
    }

    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self> {
        let new_size = reader.get_index()?;
        let encrypted = reader.get_bool()?;
        let key_serializer_id = reader.get_u8()?;
        let count = reader.get_index()?;
        // Each record needs at least its length prefix; don't trust `count` for the allocation
        let mut removed_records = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            removed_records.push(reader.get_bytes()?);
        }
        Ok(ShrinkPO {
            header,
            new_size,
            removed_records,
            encrypted,
            key_serializer_id,
        })
    }
}
