//! Page operations: the physiological log records of bucket mutations
//!
//! Every successful bucket mutation produces one page operation (PO) holding
//! enough data to redo the mutation on the pre-image and to undo it on the
//! post-image, byte-for-byte. A PO does not reference the bucket or entry that
//! created it; it can be decoded from bytes and applied to any cache entry
//! with the same page identity.
//!
//! # Wire format
//!
//! All integers are little-endian.
//!
//! ```text
//! [version: u8 = 1]
//! [kind: u8]
//! [file_id: u64][page_index: u64]
//! [operation_unit_id: 16 bytes]
//! [payload: kind-specific]
//! ```
//!
//! | Kind | Tag | Payload |
//! |------|-----|---------|
//! | AddLeafEntry | 1 | index, key, value |
//! | RemoveLeafEntry | 2 | index, key, value |
//! | AddNonLeafEntry | 3 | index, key, update flag, left, right, prev child |
//! | RemoveNonLeafEntry | 4 | index, prev child, key, left, right |
//! | UpdateValue | 5 | index, key size, previous value, value |
//! | SetRightSibling | 6 | previous sibling, sibling |
//! | Shrink | 7 | new size, encrypted flag, key codec id, removed cells |
//!
//! Indices, sizes and child pointers are `u32`; byte arrays are `u32`-length
//! prefixed; optional child and sibling pointers are `i64` with -1 for none.

mod leaf;
mod non_leaf;
mod shrink;
pub mod stream;
mod update;

pub use leaf::{AddLeafEntryPO, RemoveLeafEntryPO};
pub use non_leaf::{AddNonLeafEntryPO, RemoveNonLeafEntryPO};
pub use shrink::ShrinkPO;
pub use update::{SetRightSiblingPO, UpdateValuePO};

use crate::cache::CacheEntry;
use cellbtree_core::types::{FileId, OperationUnitId, PageId, PageIndex};
use cellbtree_core::{Error, Result};
use stream::{StreamReader, StreamWriter};

/// Current page operation format version
pub const FORMAT_VERSION: u8 = 1;

/// Bytes before the kind-specific payload
pub const HEADER_SIZE: usize = 1 + 1 + 8 + 8 + OperationUnitId::SIZE;

// ============================================================================
// Kind
// ============================================================================

/// Page operation kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageOperationKind {
    /// Leaf entry inserted
    AddLeafEntry = 1,
    /// Leaf entry removed
    RemoveLeafEntry = 2,
    /// Separator inserted
    AddNonLeafEntry = 3,
    /// Separator removed
    RemoveNonLeafEntry = 4,
    /// Leaf value overwritten in place
    UpdateValue = 5,
    /// Right sibling changed
    SetRightSibling = 6,
    /// Entries truncated from the end
    Shrink = 7,
}

impl PageOperationKind {
    /// Tag byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a tag byte
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(PageOperationKind::AddLeafEntry),
            2 => Some(PageOperationKind::RemoveLeafEntry),
            3 => Some(PageOperationKind::AddNonLeafEntry),
            4 => Some(PageOperationKind::RemoveNonLeafEntry),
            5 => Some(PageOperationKind::UpdateValue),
            6 => Some(PageOperationKind::SetRightSibling),
            7 => Some(PageOperationKind::Shrink),
            _ => None,
        }
    }
}

// ============================================================================
// Header
// ============================================================================

/// Routing data shared by every page operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOperationHeader {
    /// Page the operation was recorded against
    pub page_id: PageId,
    /// Operation unit the operation belongs to
    pub operation_unit_id: OperationUnitId,
}

impl PageOperationHeader {
    /// Header for an operation on page `page_index` of `file_id`
    pub fn new(file_id: FileId, page_index: PageIndex, operation_unit_id: OperationUnitId) -> Self {
        PageOperationHeader {
            page_id: PageId::new(file_id, page_index),
            operation_unit_id,
        }
    }

    /// Fail with [`Error::Misrouted`] unless `entry` is the recorded page
    pub fn ensure_routed(&self, entry: &CacheEntry) -> Result<()> {
        let actual = entry.page_id();
        if actual != self.page_id {
            return Err(Error::Misrouted {
                expected_file: self.page_id.file_id,
                expected_page: self.page_id.page_index,
                actual_file: actual.file_id,
                actual_page: actual.page_index,
            });
        }
        Ok(())
    }

    fn write(&self, writer: &mut StreamWriter<'_>) {
        writer.put_u64(self.page_id.file_id);
        writer.put_u64(self.page_id.page_index);
        writer.put_raw(self.operation_unit_id.as_bytes());
    }

    fn read(reader: &mut StreamReader<'_>) -> Result<Self> {
        let file_id = reader.get_u64()?;
        let page_index = reader.get_u64()?;
        let unit = reader.get_array::<{ OperationUnitId::SIZE }>()?;
        Ok(PageOperationHeader::new(
            file_id,
            page_index,
            OperationUnitId::from_bytes(unit),
        ))
    }
}

// ============================================================================
// Record trait
// ============================================================================

/// Behaviour shared by the concrete page operation kinds
pub trait PageOperationRecord: Sized {
    /// Kind tag written ahead of the payload
    const KIND: PageOperationKind;

    /// Routing header
    fn header(&self) -> &PageOperationHeader;

    /// Mutable routing header
    fn header_mut(&mut self) -> &mut PageOperationHeader;

    /// Reapply the mutation to the pre-image
    fn redo(&self, entry: &mut CacheEntry) -> Result<()>;

    /// Revert the mutation on the post-image
    fn undo(&self, entry: &mut CacheEntry) -> Result<()>;

    /// Encoded payload length
    fn payload_size(&self) -> usize;

    /// Encode the payload
    fn write_payload(&self, writer: &mut StreamWriter<'_>);

    /// Decode the payload following `header`
    fn read_payload(header: PageOperationHeader, reader: &mut StreamReader<'_>) -> Result<Self>;

    /// Encoded length including the common header
    fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.payload_size()
    }
}

// ============================================================================
// PageOperation
// ============================================================================

/// Any page operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOperation {
    /// See [`AddLeafEntryPO`]
    AddLeafEntry(AddLeafEntryPO),
    /// See [`RemoveLeafEntryPO`]
    RemoveLeafEntry(RemoveLeafEntryPO),
    /// See [`AddNonLeafEntryPO`]
    AddNonLeafEntry(AddNonLeafEntryPO),
    /// See [`RemoveNonLeafEntryPO`]
    RemoveNonLeafEntry(RemoveNonLeafEntryPO),
    /// See [`UpdateValuePO`]
    UpdateValue(UpdateValuePO),
    /// See [`SetRightSiblingPO`]
    SetRightSibling(SetRightSiblingPO),
    /// See [`ShrinkPO`]
    Shrink(ShrinkPO),
}

macro_rules! dispatch {
    ($value:expr, $op:ident => $body:expr) => {
        match $value {
            PageOperation::AddLeafEntry($op) => $body,
            PageOperation::RemoveLeafEntry($op) => $body,
            PageOperation::AddNonLeafEntry($op) => $body,
            PageOperation::RemoveNonLeafEntry($op) => $body,
            PageOperation::UpdateValue($op) => $body,
            PageOperation::SetRightSibling($op) => $body,
            PageOperation::Shrink($op) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident($po:ty)),* $(,)?) => {
        $(
            impl From<$po> for PageOperation {
                fn from(op: $po) -> Self {
                    PageOperation::$variant(op)
                }
            }
        )*
    };
}

impl_from!(
    AddLeafEntry(AddLeafEntryPO),
    RemoveLeafEntry(RemoveLeafEntryPO),
    AddNonLeafEntry(AddNonLeafEntryPO),
    RemoveNonLeafEntry(RemoveNonLeafEntryPO),
    UpdateValue(UpdateValuePO),
    SetRightSibling(SetRightSiblingPO),
    Shrink(ShrinkPO),
);

fn read_record<R: PageOperationRecord>(
    header: PageOperationHeader,
    reader: &mut StreamReader<'_>,
) -> Result<R> {
    R::read_payload(header, reader)
}

impl PageOperation {
    /// Kind tag
    pub fn kind(&self) -> PageOperationKind {
        fn kind_of<R: PageOperationRecord>(_: &R) -> PageOperationKind {
            R::KIND
        }
        dispatch!(self, op => kind_of(op))
    }

    /// Routing header
    pub fn header(&self) -> &PageOperationHeader {
        dispatch!(self, op => op.header())
    }

    /// Page the operation was recorded against
    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    /// Operation unit the operation belongs to
    pub fn operation_unit_id(&self) -> OperationUnitId {
        self.header().operation_unit_id
    }

    /// Re-stamp the operation unit
    pub fn set_operation_unit_id(&mut self, operation_unit_id: OperationUnitId) {
        dispatch!(self, op => op.header_mut().operation_unit_id = operation_unit_id)
    }

    /// Reapply the mutation to the pre-image held by `entry`
    pub fn redo(&self, entry: &mut CacheEntry) -> Result<()> {
        dispatch!(self, op => op.redo(entry))
    }

    /// Revert the mutation on the post-image held by `entry`
    pub fn undo(&self, entry: &mut CacheEntry) -> Result<()> {
        dispatch!(self, op => op.undo(entry))
    }

    /// Encoded length
    pub fn serialized_size(&self) -> usize {
        dispatch!(self, op => op.serialized_size())
    }

    /// Encode into `buf` at `offset`, returning the offset after the last byte
    ///
    /// # Panics
    ///
    /// Panics if `buf` has fewer than [`serialized_size`](Self::serialized_size)
    /// bytes after `offset`.
    pub fn to_stream(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut writer = StreamWriter::new(buf, offset);
        writer.put_u8(FORMAT_VERSION);
        writer.put_u8(self.kind().as_u8());
        self.header().write(&mut writer);
        dispatch!(self, op => op.write_payload(&mut writer));
        writer.position()
    }

    /// Encode into a fresh vector
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.serialized_size()];
        let end = self.to_stream(&mut buf, 0);
        debug_assert_eq!(end, buf.len());
        buf
    }

    /// Decode the operation starting at `offset`
    ///
    /// Returns the operation and the offset after its last byte.
    pub fn from_stream(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut reader = StreamReader::new(bytes, offset);
        let version = reader.get_u8()?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion(version));
        }
        let tag = reader.get_u8()?;
        let kind = PageOperationKind::from_u8(tag).ok_or(Error::UnknownOperationKind(tag))?;
        let header = PageOperationHeader::read(&mut reader)?;

        let r = &mut reader;
        let operation = match kind {
            PageOperationKind::AddLeafEntry => {
                PageOperation::AddLeafEntry(read_record(header, r)?)
            }
            PageOperationKind::RemoveLeafEntry => {
                PageOperation::RemoveLeafEntry(read_record(header, r)?)
            }
            PageOperationKind::AddNonLeafEntry => {
                PageOperation::AddNonLeafEntry(read_record(header, r)?)
            }
            PageOperationKind::RemoveNonLeafEntry => {
                PageOperation::RemoveNonLeafEntry(read_record(header, r)?)
            }
            PageOperationKind::UpdateValue => PageOperation::UpdateValue(read_record(header, r)?),
            PageOperationKind::SetRightSibling => {
                PageOperation::SetRightSibling(read_record(header, r)?)
            }
            PageOperationKind::Shrink => PageOperation::Shrink(read_record(header, r)?),
        };
        Ok((operation, reader.position()))
    }

    /// Decode an operation that must span all of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (operation, end) = Self::from_stream(bytes, 0)?;
        if end != bytes.len() {
            return Err(Error::Corruption(format!(
                "{} trailing bytes after page operation",
                bytes.len() - end
            )));
        }
        Ok(operation)
    }
}
