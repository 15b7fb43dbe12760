//! Error types for the page store
//!
//! A single [`Error`] enum covers three families of failure:
//!
//! | Family | Variants | Meaning |
//! |--------|----------|---------|
//! | Contract | IndexOutOfBounds, WrongBucketKind, KeySizeMismatch, ValueSizeMismatch, EntryMismatch, BrokenChildChain, InvalidArgument, PageTooSmall | The caller broke a precondition; nothing was mutated |
//! | Replay | ReplayOverflow, Misrouted | A page operation cannot be applied to the page it was given |
//! | Format | Truncated, UnknownOperationKind, UnsupportedFormatVersion, ChecksumMismatch, Corruption, Io | Persisted bytes are damaged or unreadable |
//!
//! Running out of page space on a forward mutation is *not* an error: the
//! bucket reports it as `Ok(false)` so the index layer can split.

use thiserror::Error;

/// All page store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Ordinal entry index outside the live directory
    #[error("entry index {index} out of bounds (size {size})")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Live entry count
        size: usize,
    },

    /// Leaf operation on a non-leaf bucket or the other way round
    #[error("wrong bucket kind: operation requires a {} bucket", bucket_kind(.expected_leaf))]
    WrongBucketKind {
        /// Whether the operation needed a leaf bucket
        expected_leaf: bool,
    },

    /// Supplied key size differs from the stored key length
    #[error("key size mismatch: expected {expected}, got {actual}")]
    KeySizeMismatch {
        /// Stored key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },

    /// In-place value update with a value of a different length
    #[error("value size mismatch: stored value is {expected} bytes, new value is {actual} bytes")]
    ValueSizeMismatch {
        /// Stored value length
        expected: usize,
        /// Supplied value length
        actual: usize,
    },

    /// Caller-supplied entry content does not match the stored cell
    #[error("entry {index} does not match the supplied content")]
    EntryMismatch {
        /// Entry index
        index: usize,
    },

    /// Separator neighbours do not share a child pointer across `index`
    ///
    /// Splicing or collapsing such a position could not be undone exactly.
    #[error("separator chain broken at entry {index}")]
    BrokenChildChain {
        /// Entry index
        index: usize,
    },

    /// Argument outside the accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Page buffer too small to hold a bucket
    #[error("page of {size} bytes is too small (minimum {minimum})")]
    PageTooSmall {
        /// Actual page size
        size: usize,
        /// Minimum accepted page size
        minimum: usize,
    },

    /// A logged insert does not fit the page it is replayed against
    #[error("replay overflow: {required} bytes required, {available} available")]
    ReplayOverflow {
        /// Bytes the cell and its directory slot need
        required: usize,
        /// Bytes of free space on the page
        available: usize,
    },

    /// Page operation applied to a page with a different identity
    #[error("page operation for file {expected_file}/page {expected_page} applied to file {actual_file}/page {actual_page}")]
    Misrouted {
        /// File the operation was recorded against
        expected_file: u64,
        /// Page the operation was recorded against
        expected_page: u64,
        /// File of the target page
        actual_file: u64,
        /// Page index of the target page
        actual_page: u64,
    },

    /// Input ended before a complete value could be read
    #[error("truncated input: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        have: usize,
    },

    /// Unknown page operation kind tag
    #[error("unknown page operation kind: {0}")]
    UnknownOperationKind(u8),

    /// Unknown page operation format version
    #[error("unsupported page operation format version: {0}")]
    UnsupportedFormatVersion(u8),

    /// Log record checksum does not match its content
    #[error("checksum mismatch at sequence {sequence}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Sequence number read from the frame
        sequence: u64,
        /// Checksum stored in the frame
        stored: u32,
        /// Checksum computed over the frame content
        computed: u32,
    },

    /// Structurally invalid persisted data
    #[error("corruption: {0}")]
    Corruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn bucket_kind(leaf: &bool) -> &'static str {
    if *leaf {
        "leaf"
    } else {
        "non-leaf"
    }
}

/// Result type for page store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error means persisted bytes are damaged.
    ///
    /// Corruption found during replay is fatal for recovery.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. }
                | Error::UnknownOperationKind(_)
                | Error::UnsupportedFormatVersion(_)
                | Error::ChecksumMismatch { .. }
                | Error::Corruption(_)
        )
    }

    /// Check if this error is a caller precondition failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfBounds { .. }
                | Error::WrongBucketKind { .. }
                | Error::KeySizeMismatch { .. }
                | Error::ValueSizeMismatch { .. }
                | Error::EntryMismatch { .. }
                | Error::BrokenChildChain { .. }
                | Error::InvalidArgument(_)
                | Error::PageTooSmall { .. }
        )
    }

    /// Check if this error was raised while replaying an operation.
    pub fn is_replay_failure(&self) -> bool {
        matches!(self, Error::ReplayOverflow { .. } | Error::Misrouted { .. })
    }
}
