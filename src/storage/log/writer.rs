//! Log Writer
//!
//! Handles appending records to the log file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{CarbonError, Result};
use super::{LogRecord, Operation};

/// Appends records to the log file
///
/// Frames go straight to the file, so a failed append leaves nothing
/// buffered behind it. The file is cut back to the last whole frame; if
/// that fails too the writer refuses further appends.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    /// End of the last frame known to be whole
    offset: u64,
    next_lsn: u64,
    records: u64,
    sync_strategy: SyncStrategy,
    unsynced: usize,
    poisoned: bool,
}

impl LogWriter {
    /// Open the log for appending
    ///
    /// `next_lsn` continues the recovered sequence and `records` is how many
    /// frames the file already holds.
    pub fn open(path: &Path, sync_strategy: SyncStrategy, next_lsn: u64, records: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            offset,
            next_lsn,
            records,
            sync_strategy,
            unsynced: 0,
            poisoned: false,
        })
    }

    /// Replace the log with a fresh one holding only `operations`
    ///
    /// The new log is written beside the old one and renamed over it.
    pub fn rewrite(
        path: &Path,
        sync_strategy: SyncStrategy,
        operations: impl IntoIterator<Item = Operation>,
    ) -> Result<Self> {
        let tmp_path = path.with_extension("log.compact");
        let mut lsn = 1;
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for operation in operations {
                tmp.write_all(&LogRecord::new(lsn, operation).encode()?)?;
                lsn += 1;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        Self::open(path, sync_strategy, lsn, lsn - 1)
    }

    /// Append an operation, returning its LSN
    ///
    /// On error the LSN is not consumed and the file ends at the previous
    /// frame.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        if self.poisoned {
            return Err(CarbonError::Storage(format!(
                "log {} has a partial record and refuses appends",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let frame = LogRecord::new(lsn, operation).encode()?;
        if let Err(e) = self.write_frame(&frame) {
            self.rollback();
            return Err(e);
        }

        self.offset += frame.len() as u64;
        self.next_lsn += 1;
        self.records += 1;
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.unsynced += 1;

        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.sync(),
            SyncStrategy::EveryNRecords { count } if self.unsynced >= count => self.sync(),
            SyncStrategy::EveryNRecords { .. } => Ok(()),
        }
    }

    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.offset) {
            tracing::error!(
                "Failed to truncate log {} back to {} bytes: {}",
                self.path.display(),
                self.offset,
                e
            );
            self.poisoned = true;
        }
    }

    /// Force everything written so far to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next append will receive
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Frames in the file, live or dead
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            tracing::warn!("Failed to sync log {} on close: {}", self.path.display(), e);
        }
    }
}
