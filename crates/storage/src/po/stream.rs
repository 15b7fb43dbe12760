//! Cursor helpers for the page operation byte format
//!
//! Writers fill a slice pre-sized from `serialized_size`, so running off the
//! end is a sizing bug and panics. Readers work on untrusted bytes and report
//! short input as [`Error::Truncated`].

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use cellbtree_core::{Error, Result};
use std::io::{Cursor, Read};

/// Encoded size of a length-prefixed byte array
#[inline]
pub const fn bytes_size(len: usize) -> usize {
    4 + len
}

/// Sequential little-endian writer over a pre-sized buffer
pub struct StreamWriter<'a> {
    buf: &'a mut [u8],
    position: usize,
}

impl<'a> StreamWriter<'a> {
    /// Start writing at `position`
    pub fn new(buf: &'a mut [u8], position: usize) -> Self {
        StreamWriter { buf, position }
    }

    /// Offset of the next byte to be written
    pub fn position(&self) -> usize {
        self.position
    }

    fn advance(&mut self, len: usize) -> &mut [u8] {
        let start = self.position;
        self.position += len;
        &mut self.buf[start..start + len]
    }

    /// Write one byte
    pub fn put_u8(&mut self, value: u8) {
        self.advance(1)[0] = value;
    }

    /// Write a boolean as one byte
    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    /// Write a `u32`
    pub fn put_u32(&mut self, value: u32) {
        LittleEndian::write_u32(self.advance(4), value);
    }

    /// Write a `u64`
    pub fn put_u64(&mut self, value: u64) {
        LittleEndian::write_u64(self.advance(8), value);
    }

    /// Write an `i64`
    pub fn put_i64(&mut self, value: i64) {
        LittleEndian::write_i64(self.advance(8), value);
    }

    /// Write an entry index or count as a `u32`
    pub fn put_index(&mut self, value: usize) {
        self.put_u32(value as u32);
    }

    /// Write an optional child pointer as an `i64`, -1 for none
    pub fn put_optional_child(&mut self, child: Option<u32>) {
        self.put_i64(child.map_or(-1, i64::from));
    }

    /// Write an optional page index as an `i64`, -1 for none
    pub fn put_optional_page(&mut self, page: Option<u64>) {
        self.put_i64(page.map_or(-1, |p| p as i64));
    }

    /// Write bytes without a length prefix
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.advance(bytes.len()).copy_from_slice(bytes);
    }

    /// Write a `u32` length followed by the bytes
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.put_raw(bytes);
    }
}

/// Sequential little-endian reader over untrusted bytes
pub struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> StreamReader<'a> {
    /// Start reading at `position`
    pub fn new(bytes: &'a [u8], position: usize) -> Self {
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(position as u64);
        StreamReader { cursor }
    }

    /// Offset of the next byte to be read
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let have = self.remaining();
        if have < needed {
            return Err(Error::Truncated { needed, have });
        }
        Ok(())
    }

    /// Read one byte
    pub fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.cursor.read_u8()?)
    }

    /// Read a boolean byte; anything other than 0 or 1 is corruption
    pub fn get_bool(&mut self) -> Result<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Corruption(format!("invalid boolean byte {}", other))),
        }
    }

    /// Read a `u32`
    pub fn get_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    /// Read a `u64`
    pub fn get_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    /// Read an `i64`
    pub fn get_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.cursor.read_i64::<LittleEndian>()?)
    }

    /// Read an entry index or count
    pub fn get_index(&mut self) -> Result<usize> {
        Ok(self.get_u32()? as usize)
    }

    /// Read an optional child pointer written by
    /// [`StreamWriter::put_optional_child`]
    pub fn get_optional_child(&mut self) -> Result<Option<u32>> {
        match self.get_i64()? {
            -1 => Ok(None),
            raw => u32::try_from(raw)
                .map(Some)
                .map_err(|_| Error::Corruption(format!("invalid child pointer {}", raw))),
        }
    }

    /// Read an optional page index written by
    /// [`StreamWriter::put_optional_page`]
    pub fn get_optional_page(&mut self) -> Result<Option<u64>> {
        match self.get_i64()? {
            -1 => Ok(None),
            raw => u64::try_from(raw)
                .map(Some)
                .map_err(|_| Error::Corruption(format!("invalid page index {}", raw))),
        }
    }

    /// Read exactly `N` bytes
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.cursor.read_exact(&mut out)?;
        Ok(out)
    }

    /// Read a length-prefixed byte array
    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        self.ensure(len)?;
        let mut out = vec![0u8; len];
        self.cursor.read_exact(&mut out)?;
        Ok(out)
    }
}
