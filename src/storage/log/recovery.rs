//! Log Recovery
//!
//! Replays the log on startup and cuts off torn writes.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::Result;
use super::LogRecord;

/// Outcome of a recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of records successfully replayed
    pub records_replayed: u64,

    /// Bytes removed from the end of the log
    pub bytes_truncated: u64,

    /// Last valid LSN (0 when the log is empty)
    pub last_lsn: u64,
}

impl RecoveryStats {
    pub fn was_truncated(&self) -> bool {
        self.bytes_truncated > 0
    }
}

/// Read every valid record from the log at `path`
///
/// Stops at the first record that is cut short or fails its checksum and
/// truncates the file there, so later appends land on a clean boundary.
pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryStats)> {
    let mut stats = RecoveryStats::default();
    if !path.exists() {
        return Ok((Vec::new(), stats));
    }

    let bytes = fs::read(path)?;
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        match LogRecord::decode(&bytes[offset..]) {
            Ok((record, consumed)) => {
                stats.last_lsn = record.lsn;
                stats.records_replayed += 1;
                records.push(record);
                offset += consumed;
            }
            Err(e) => {
                tracing::warn!(
                    "Log {} damaged at offset {}: {}; truncating",
                    path.display(),
                    offset,
                    e
                );
                break;
            }
        }
    }

    if offset < bytes.len() {
        stats.bytes_truncated = (bytes.len() - offset) as u64;
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(offset as u64)?;
        file.sync_all()?;
    }

    Ok((records, stats))
}
