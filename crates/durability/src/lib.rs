//! Durability layer for the cell B-tree
//!
//! This crate implements the operation log boundary:
//! - Frame encoding/decoding with CRC32 checksums
//! - OperationLog: append-only log drained from cache entries
//! - Replayer: redo in log order, rollback of one operation unit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod replay;
pub mod wal;

pub use encoding::{decode_record, encode_record, Frame, Frames, LogRecord, FRAME_HEADER_SIZE};
pub use replay::{ReplayOptions, ReplayResult, Replayer};
pub use wal::OperationLog;
