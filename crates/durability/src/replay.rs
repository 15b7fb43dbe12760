//! Redo and rollback of a logged operation stream
//!
//! ## Replay Sequence
//!
//! - redo: every record routed to a supplied page is redone, in log order
//! - rollback: every record of one operation unit is undone, newest first
//!
//! Records for pages outside the supplied set are counted as skipped. A record
//! that cannot be decoded is log corruption and is handled per
//! [`ReplayOptions`]; a decoded record that cannot be applied is a replay
//! failure and always aborts.
//!
//! ## Usage
//!
//! ```ignore
//! let result = Replayer::new(ReplayOptions::strict()).redo(&log, &mut pages)?;
//! println!("{}", result.summary());
//! ```

use crate::encoding::LogRecord;
use crate::wal::OperationLog;
use cellbtree_core::{Error, OperationUnitId, PageId, Result};
use cellbtree_storage::CacheEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// Replay Options
// ============================================================================

/// Replay options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOptions {
    /// Whether frame checksums are verified before decoding
    pub verify_checksums: bool,
    /// Whether the first corrupt frame fails the replay
    pub stop_on_corruption: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self::strict()
    }
}

impl ReplayOptions {
    /// Strict replay - fail on any corruption
    pub fn strict() -> Self {
        ReplayOptions {
            verify_checksums: true,
            stop_on_corruption: true,
        }
    }

    /// Permissive replay - skip and count corrupt frames
    pub fn permissive() -> Self {
        ReplayOptions {
            verify_checksums: true,
            stop_on_corruption: false,
        }
    }

    /// Fast replay - trust the log, skip checksum verification
    pub fn fast() -> Self {
        ReplayOptions {
            verify_checksums: false,
            stop_on_corruption: true,
        }
    }
}

// ============================================================================
// Replay Result
// ============================================================================

/// Replay result
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// Records applied
    pub applied: u64,
    /// Records routed to pages outside the supplied set
    pub skipped: u64,
    /// Corrupt frames skipped
    pub corrupt: u64,
    /// Sequence of the last record applied
    pub last_sequence: Option<u64>,
}

impl ReplayResult {
    /// Get human-readable summary
    pub fn summary(&self) -> String {
        let last = match self.last_sequence {
            Some(sequence) => format!("last sequence {}", sequence),
            None => "nothing applied".to_string(),
        };
        format!(
            "Replay complete: {} applied, {} skipped, {} corrupt ({})",
            self.applied, self.skipped, self.corrupt, last
        )
    }

    /// Whether any frame was skipped as corrupt
    pub fn has_issues(&self) -> bool {
        self.corrupt > 0
    }
}

// ============================================================================
// Replayer
// ============================================================================

/// Replay engine
#[derive(Debug, Clone, Default)]
pub struct Replayer {
    options: ReplayOptions,
}

impl Replayer {
    /// Create a replayer
    pub fn new(options: ReplayOptions) -> Self {
        Replayer { options }
    }

    /// Options in use
    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Redo every record routed to one of `pages`, in log order
    pub fn redo(&self, log: &OperationLog, pages: &mut [CacheEntry]) -> Result<ReplayResult> {
        let mut result = ReplayResult::default();

        for record in self.decode(log, &mut result)? {
            let Some(entry) = find_page(pages, record.operation.page_id()) else {
                result.skipped += 1;
                continue;
            };
            record.operation.redo(entry)?;
            result.applied += 1;
            result.last_sequence = Some(record.sequence);
        }

        info!("{}", result.summary());
        Ok(result)
    }

    /// Undo every record of `unit`, newest first
    pub fn rollback(
        &self,
        log: &OperationLog,
        unit: OperationUnitId,
        pages: &mut [CacheEntry],
    ) -> Result<ReplayResult> {
        let mut result = ReplayResult::default();
        let records: Vec<LogRecord> = self
            .decode(log, &mut result)?
            .into_iter()
            .filter(|record| record.operation.operation_unit_id() == unit)
            .collect();
        debug!(unit = %unit, records = records.len(), "rolling back operation unit");

        for record in records.iter().rev() {
            let Some(entry) = find_page(pages, record.operation.page_id()) else {
                result.skipped += 1;
                continue;
            };
            record.operation.undo(entry)?;
            result.applied += 1;
            result.last_sequence = Some(record.sequence);
        }

        info!("{}", result.summary());
        Ok(result)
    }

    fn decode(&self, log: &OperationLog, result: &mut ReplayResult) -> Result<Vec<LogRecord>> {
        let mut records = Vec::with_capacity(log.len());
        let mut previous: Option<u64> = None;

        for frame in log.frames() {
            let decoded = frame.and_then(|frame| {
                let record = frame.decode(self.options.verify_checksums)?;
                if previous.is_some_and(|previous| record.sequence <= previous) {
                    return Err(Error::Corruption(format!(
                        "sequence {} at offset {} out of order",
                        record.sequence,
                        frame.offset()
                    )));
                }
                Ok(record)
            });

            match decoded {
                Ok(record) => {
                    previous = Some(record.sequence);
                    records.push(record);
                }
                Err(err) if self.options.stop_on_corruption => return Err(err),
                Err(err) => {
                    warn!(error = %err, "skipping corrupt log record");
                    result.corrupt += 1;
                }
            }
        }
        Ok(records)
    }
}

fn find_page(pages: &mut [CacheEntry], page_id: PageId) -> Option<&mut CacheEntry> {
    pages.iter_mut().find(|entry| entry.page_id() == page_id)
}
