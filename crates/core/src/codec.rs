//! Binary codec contract for keys and values
//!
//! Buckets treat keys as opaque pre-serialized bytes. Codecs come in at the
//! edges: the index layer uses them to produce key/value bytes, and the bucket
//! uses a value codec to decode what it stores.
//!
//! Only the codecs the single-value index needs live here:
//!
//! | Codec | Id | Type | Size |
//! |-------|----|------|------|
//! | [`ByteCodec`] | 1 | `u8` | 1 |
//! | [`IntegerCodec`] | 8 | `i32` | 4 |
//! | [`RecordIdCodec`] | 16 | [`RecordId`] | 10 |
//!
//! All multi-byte values are little-endian.

use crate::error::{Error, Result};
use crate::types::RecordId;
use byteorder::{ByteOrder, LittleEndian};

/// Typed encode/decode of one value type to a byte buffer.
pub trait BinaryCodec<T> {
    /// Stable codec identifier, persisted in page operations
    fn id(&self) -> u8;

    /// Encoded length if every value of `T` encodes to the same size
    fn fixed_length(&self) -> Option<usize>;

    /// Whether every value encodes to the same size
    fn is_fixed_length(&self) -> bool {
        self.fixed_length().is_some()
    }

    /// Encoded length of `value`
    fn object_size(&self, value: &T) -> usize;

    /// Encoded length of the value stored at `offset`
    fn object_size_in_buffer(&self, buf: &[u8], offset: usize) -> Result<usize>;

    /// Encode `value` into `buf` starting at `offset`
    fn serialize(&self, value: &T, buf: &mut [u8], offset: usize) -> Result<()>;

    /// Decode the value stored at `offset`
    fn deserialize(&self, buf: &[u8], offset: usize) -> Result<T>;

    /// Encode `value` into a fresh vector of exactly [`object_size`](Self::object_size) bytes
    fn serialize_to_vec(&self, value: &T) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.object_size(value)];
        self.serialize(value, &mut buf, 0)?;
        Ok(buf)
    }
}

fn ensure_len(buf: &[u8], offset: usize, len: usize) -> Result<()> {
    let have = buf.len().saturating_sub(offset);
    if have < len {
        return Err(Error::Truncated { needed: len, have });
    }
    Ok(())
}

/// Single unsigned byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCodec;

impl ByteCodec {
    /// Codec id
    pub const ID: u8 = 1;
}

impl BinaryCodec<u8> for ByteCodec {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn fixed_length(&self) -> Option<usize> {
        Some(1)
    }

    fn object_size(&self, _value: &u8) -> usize {
        1
    }

    fn object_size_in_buffer(&self, _buf: &[u8], _offset: usize) -> Result<usize> {
        Ok(1)
    }

    fn serialize(&self, value: &u8, buf: &mut [u8], offset: usize) -> Result<()> {
        ensure_len(buf, offset, 1)?;
        buf[offset] = *value;
        Ok(())
    }

    fn deserialize(&self, buf: &[u8], offset: usize) -> Result<u8> {
        ensure_len(buf, offset, 1)?;
        Ok(buf[offset])
    }
}

/// Signed 32-bit integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl IntegerCodec {
    /// Codec id
    pub const ID: u8 = 8;
    const SIZE: usize = 4;
}

impl BinaryCodec<i32> for IntegerCodec {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn fixed_length(&self) -> Option<usize> {
        Some(Self::SIZE)
    }

    fn object_size(&self, _value: &i32) -> usize {
        Self::SIZE
    }

    fn object_size_in_buffer(&self, _buf: &[u8], _offset: usize) -> Result<usize> {
        Ok(Self::SIZE)
    }

    fn serialize(&self, value: &i32, buf: &mut [u8], offset: usize) -> Result<()> {
        ensure_len(buf, offset, Self::SIZE)?;
        LittleEndian::write_i32(&mut buf[offset..offset + Self::SIZE], *value);
        Ok(())
    }

    fn deserialize(&self, buf: &[u8], offset: usize) -> Result<i32> {
        ensure_len(buf, offset, Self::SIZE)?;
        Ok(LittleEndian::read_i32(&buf[offset..offset + Self::SIZE]))
    }
}

/// Record id as 2-byte cluster id followed by 8-byte cluster position.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordIdCodec;

impl RecordIdCodec {
    /// Codec id
    pub const ID: u8 = 16;
    /// Encoded size of every record id
    pub const SIZE: usize = 2 + 8;
}

impl BinaryCodec<RecordId> for RecordIdCodec {
    fn id(&self) -> u8 {
        Self::ID
    }

    fn fixed_length(&self) -> Option<usize> {
        Some(Self::SIZE)
    }

    fn object_size(&self, _value: &RecordId) -> usize {
        Self::SIZE
    }

    fn object_size_in_buffer(&self, _buf: &[u8], _offset: usize) -> Result<usize> {
        Ok(Self::SIZE)
    }

    fn serialize(&self, value: &RecordId, buf: &mut [u8], offset: usize) -> Result<()> {
        ensure_len(buf, offset, Self::SIZE)?;
        LittleEndian::write_i16(&mut buf[offset..offset + 2], value.cluster_id);
        LittleEndian::write_i64(&mut buf[offset + 2..offset + Self::SIZE], value.cluster_position);
        Ok(())
    }

    fn deserialize(&self, buf: &[u8], offset: usize) -> Result<RecordId> {
        ensure_len(buf, offset, Self::SIZE)?;
        Ok(RecordId::new(
            LittleEndian::read_i16(&buf[offset..offset + 2]),
            LittleEndian::read_i64(&buf[offset + 2..offset + Self::SIZE]),
        ))
    }
}
