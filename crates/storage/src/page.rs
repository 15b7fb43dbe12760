//! Typed little-endian access to raw page bytes
//!
//! [`DurablePage`] is a thin accessor over a page buffer. It knows nothing
//! about buckets; layouts built on top of it do their own offset arithmetic
//! and bounds checking before calling in. Out-of-range offsets here are
//! programming errors and panic like slice indexing does.

use byteorder::{ByteOrder, LittleEndian};

/// Accessor over one page buffer
pub struct DurablePage<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> DurablePage<B> {
    /// Wrap a page buffer
    pub fn new(buf: B) -> Self {
        DurablePage { buf }
    }

    /// Page size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Whether the page has zero length
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole page
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Read one byte
    #[inline]
    pub fn get_u8(&self, offset: usize) -> u8 {
        self.buf.as_ref()[offset]
    }

    /// Read a `u16`
    #[inline]
    pub fn get_u16(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.buf.as_ref()[offset..offset + 2])
    }

    /// Read a `u32`
    #[inline]
    pub fn get_u32(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.buf.as_ref()[offset..offset + 4])
    }

    /// Read an `i64`
    #[inline]
    pub fn get_i64(&self, offset: usize) -> i64 {
        LittleEndian::read_i64(&self.buf.as_ref()[offset..offset + 8])
    }

    /// Borrow `len` bytes starting at `offset`
    #[inline]
    pub fn get_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf.as_ref()[offset..offset + len]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DurablePage<B> {
    /// Write one byte
    #[inline]
    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.buf.as_mut()[offset] = value;
    }

    /// Write a `u16`
    #[inline]
    pub fn set_u16(&mut self, offset: usize, value: u16) {
        LittleEndian::write_u16(&mut self.buf.as_mut()[offset..offset + 2], value);
    }

    /// Write a `u32`
    #[inline]
    pub fn set_u32(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.buf.as_mut()[offset..offset + 4], value);
    }

    /// Write an `i64`
    #[inline]
    pub fn set_i64(&mut self, offset: usize, value: i64) {
        LittleEndian::write_i64(&mut self.buf.as_mut()[offset..offset + 8], value);
    }

    /// Copy `bytes` to `offset`
    #[inline]
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.buf.as_mut()[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Move `len` bytes from `from` to `to`; ranges may overlap
    #[inline]
    pub fn move_data(&mut self, from: usize, to: usize, len: usize) {
        if len > 0 && from != to {
            self.buf.as_mut().copy_within(from..from + len, to);
        }
    }

    /// Zero `len` bytes at `offset`
    #[inline]
    pub fn zero(&mut self, offset: usize, len: usize) {
        self.buf.as_mut()[offset..offset + len].fill(0);
    }
}
