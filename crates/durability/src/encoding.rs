//! Log frame encoding with CRC32 checksums
//!
//! Frame layout (little-endian):
//!
//! ```text
//! [len: u32][crc32: u32][sequence: u64][page operation: len bytes]
//! ```
//!
//! The checksum covers the sequence number and the page operation bytes.
//! `len` is deliberately outside it: a damaged length cannot be trusted to
//! find the next frame, so readers treat it as the end of the log.

use byteorder::{ByteOrder, LittleEndian};
use cellbtree_core::{Error, Result};
use cellbtree_storage::PageOperation;

/// Bytes before the page operation
pub const FRAME_HEADER_SIZE: usize = 4 + 4 + 8;

/// One decoded log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Position in the log; strictly increasing
    pub sequence: u64,
    /// The logged page operation
    pub operation: PageOperation,
}

/// Encode one frame
pub fn encode_record(sequence: u64, operation: &PageOperation) -> Vec<u8> {
    let size = operation.serialized_size();
    let mut buf = vec![0u8; FRAME_HEADER_SIZE + size];
    LittleEndian::write_u32(&mut buf[0..4], size as u32);
    LittleEndian::write_u64(&mut buf[8..16], sequence);
    operation.to_stream(&mut buf, FRAME_HEADER_SIZE);
    let crc = crc32fast::hash(&buf[8..]);
    LittleEndian::write_u32(&mut buf[4..8], crc);
    buf
}

/// Decode and verify the frame starting at `offset`
///
/// Returns the record and the offset of the next frame.
pub fn decode_record(bytes: &[u8], offset: usize) -> Result<(LogRecord, usize)> {
    let frame = Frame::parse(bytes, offset)?;
    let record = frame.decode(true)?;
    Ok((record, frame.end()))
}

/// Raw frame borrowed from a log buffer
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    offset: usize,
    sequence: u64,
    checksum: u32,
    covered: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split the frame at `offset` without checking its checksum
    pub fn parse(bytes: &'a [u8], offset: usize) -> Result<Self> {
        let have = bytes.len().saturating_sub(offset);
        if have < FRAME_HEADER_SIZE {
            return Err(Error::Truncated {
                needed: FRAME_HEADER_SIZE,
                have,
            });
        }
        let header = &bytes[offset..offset + FRAME_HEADER_SIZE];
        let len = LittleEndian::read_u32(&header[0..4]) as usize;
        let needed = FRAME_HEADER_SIZE + len;
        if have < needed {
            return Err(Error::Truncated { needed, have });
        }
        Ok(Frame {
            offset,
            sequence: LittleEndian::read_u64(&header[8..16]),
            checksum: LittleEndian::read_u32(&header[4..8]),
            covered: &bytes[offset + 8..offset + needed],
        })
    }

    /// Offset of the frame in its buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset just past the frame
    pub fn end(&self) -> usize {
        self.offset + 8 + self.covered.len()
    }

    /// Sequence number as stored (unverified)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Check the stored checksum
    pub fn verify(&self) -> Result<()> {
        let computed = crc32fast::hash(self.covered);
        if computed != self.checksum {
            return Err(Error::ChecksumMismatch {
                sequence: self.sequence,
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }

    /// Decode the page operation, verifying the checksum first if asked
    pub fn decode(&self, verify: bool) -> Result<LogRecord> {
        if verify {
            self.verify()?;
        }
        let operation = PageOperation::from_bytes(&self.covered[8..])?;
        Ok(LogRecord {
            sequence: self.sequence,
            operation,
        })
    }
}

/// Iterator over the frames of a log buffer
///
/// Yields one `Err` for a torn tail and stops there.
pub struct Frames<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Frames<'a> {
    /// Iterate `bytes` from the start
    pub fn new(bytes: &'a [u8]) -> Self {
        Frames {
            bytes,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.bytes.len() {
            return None;
        }
        match Frame::parse(self.bytes, self.offset) {
            Ok(frame) => {
                self.offset = frame.end();
                Some(Ok(frame))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
