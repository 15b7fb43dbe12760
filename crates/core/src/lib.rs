//! Core types for cellbtree
//!
//! This crate defines the pieces shared by every layer of the page store:
//! - [`Error`] / [`Result`]: the single error type for bucket, page operation and log code
//! - [`OperationUnitId`], [`PageId`], [`RecordId`]: identity types
//! - [`BinaryCodec`]: the typed encode/decode contract for keys and values,
//!   plus the fixture codecs used by the index layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{BinaryCodec, ByteCodec, IntegerCodec, RecordIdCodec};
pub use error::{Error, Result};
pub use types::{FileId, OperationUnitId, PageId, PageIndex, RecordId};
