//! Identity types shared across the page store
//!
//! - [`PageId`]: (file id, page index) pair naming one page
//! - [`OperationUnitId`]: groups the page operations of one atomic unit
//! - [`RecordId`]: the cluster id / cluster position pair stored as index values

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File identifier inside the storage.
pub type FileId = u64;

/// Page index inside a file.
pub type PageIndex = u64;

/// Identity of one page: the file it belongs to and its index in that file.
///
/// Every page operation carries the id of the page it was recorded against so
/// that replay can route it without any other context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    /// File identifier
    pub file_id: FileId,
    /// Page index within the file
    pub page_index: PageIndex,
}

impl PageId {
    /// Create a new page id
    pub fn new(file_id: FileId, page_index: PageIndex) -> Self {
        Self {
            file_id,
            page_index,
        }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_index)
    }
}

/// Identifier grouping all page operations of one atomic operation
///
/// Operation units are what rollback works on: undoing a unit undoes every
/// page operation stamped with its id, newest first.
///
/// # Examples
///
/// ```
/// use cellbtree_core::types::OperationUnitId;
///
/// let a = OperationUnitId::new();
/// let b = OperationUnitId::new();
/// assert_ne!(a, b);
/// assert_eq!(a, OperationUnitId::from_bytes(*a.as_bytes()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationUnitId(Uuid);

impl OperationUnitId {
    /// Serialized length in bytes
    pub const SIZE: usize = 16;

    /// Create a new random operation unit id using UUID v4
    pub fn new() -> Self {
        OperationUnitId(Uuid::new_v4())
    }

    /// The nil id, used by cache entries outside any operation unit
    pub fn nil() -> Self {
        OperationUnitId(Uuid::nil())
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        OperationUnitId(Uuid::from_bytes(bytes))
    }

    /// Get raw bytes representation
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Check if this is the nil id
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for OperationUnitId {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for OperationUnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record identifier: a cluster id and a position within the cluster
///
/// This is the value type of single-value indexes; its binary form is
/// produced by [`RecordIdCodec`](crate::codec::RecordIdCodec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    /// Cluster identifier
    pub cluster_id: i16,
    /// Position inside the cluster
    pub cluster_position: i64,
}

impl RecordId {
    /// Create a new record id
    pub fn new(cluster_id: i16, cluster_position: i64) -> Self {
        Self {
            cluster_id,
            cluster_position,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}", self.cluster_id, self.cluster_position)
    }
}
