//! Append-only operation log
//!
//! The log is the boundary between buckets and durable storage: pending page
//! operations are drained from cache entries into checksummed frames, and the
//! frame buffer can be written to and read back from any byte stream.

use crate::encoding::{encode_record, Frame, Frames, LogRecord};
use cellbtree_core::{Error, Result};
use cellbtree_storage::{CacheEntry, PageOperation};
use std::io::{Read, Write};
use tracing::{debug, warn};

/// In-memory log of framed page operations
#[derive(Debug, Default, Clone)]
pub struct OperationLog {
    buf: Vec<u8>,
    frames: usize,
    next_sequence: u64,
}

impl OperationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one operation, returning its sequence number
    pub fn append(&mut self, operation: &PageOperation) -> u64 {
        let sequence = self.next_sequence;
        self.buf.extend(encode_record(sequence, operation));
        self.next_sequence += 1;
        self.frames += 1;
        sequence
    }

    /// Move every pending operation of `entry` into the log, oldest first
    ///
    /// Returns the number of operations appended.
    pub fn drain(&mut self, entry: &mut CacheEntry) -> usize {
        let operations = entry.take_page_operations();
        for operation in &operations {
            self.append(operation);
        }
        if !operations.is_empty() {
            debug!(
                page = %entry.page_id(),
                count = operations.len(),
                "drained page operations"
            );
        }
        operations.len()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames
    }

    /// Whether the log holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Sequence number the next appended frame will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Encoded frames
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Raw frames in log order
    pub fn frames(&self) -> Frames<'_> {
        Frames::new(&self.buf)
    }

    /// Decode every record in log order, failing on the first bad frame
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        self.frames()
            .map(|frame| frame.and_then(|frame| frame.decode(true)))
            .collect()
    }

    /// Write the frames to `writer`
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.buf)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a log previously written with [`write_to`](Self::write_to)
    ///
    /// A torn final frame is dropped with a warning. Checksums are not
    /// verified here; replay does that.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    /// Adopt an encoded frame buffer
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self> {
        let mut frames = 0;
        let mut valid_len = 0;
        let mut last_sequence = None;
        for frame in Frames::new(&bytes) {
            match frame {
                Ok(frame) => {
                    frames += 1;
                    valid_len = frame.end();
                    last_sequence = Some(frame_sequence(&frame, last_sequence)?);
                }
                Err(err) => {
                    warn!(
                        offset = valid_len,
                        error = %err,
                        "dropping torn tail of operation log"
                    );
                }
            }
        }
        bytes.truncate(valid_len);

        Ok(OperationLog {
            buf: bytes,
            frames,
            next_sequence: last_sequence.map_or(0, |sequence| sequence + 1),
        })
    }
}

fn frame_sequence(frame: &Frame<'_>, previous: Option<u64>) -> Result<u64> {
    let sequence = frame.sequence();
    match previous {
        Some(previous) if sequence <= previous => Err(Error::Corruption(format!(
            "sequence {} at offset {} does not follow {}",
            sequence,
            frame.offset(),
            previous
        ))),
        _ => Ok(sequence),
    }
}
