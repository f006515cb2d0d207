//! Durable log-structured storage
//!
//! Every mutation is appended to `{data_dir}/carbon.log` before it becomes
//! visible; the log is replayed into an in-memory index on open.
//!
//! Once the log holds at least `compaction_threshold` records and more than
//! twice as many records as live keys, it is rewritten with one record per
//! key. This is checked on open and after every put or delete.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ...                                     │
//! └─────────────────────────────────────────┘
//! ```

mod record;
mod recovery;
mod writer;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, SyncStrategy};
use crate::error::Result;
use super::Storage;

pub use record::{LogRecord, Operation, HEADER_SIZE};
pub use recovery::RecoveryStats;
use writer::LogWriter;

/// Durable storage backend
///
/// ## Concurrency
/// - Writes hold `writer` for the append and the index update, so the log
///   order and the visible order agree (last writer wins).
/// - Reads only take the `index` read lock.
/// - Compaction runs under `writer` too, so no append races the rewrite.
pub struct LogStore {
    index: RwLock<HashMap<String, Vec<u8>>>,
    writer: Mutex<LogWriter>,
    recovery: RecoveryStats,
    compaction_threshold: u64,
    sync_strategy: SyncStrategy,
}

impl LogStore {
    const LOG_FILENAME: &'static str = "carbon.log";

    /// Open or create the store described by `config`
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Replay the log, truncating any torn tail
    /// 3. Compact if the log is mostly dead records
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let path = config.data_dir.join(Self::LOG_FILENAME);

        let (records, recovery) = recovery::recover(&path)?;
        if recovery.records_replayed > 0 || recovery.was_truncated() {
            tracing::info!(
                "Log recovery: {} records replayed, {} bytes truncated, last_lsn={}",
                recovery.records_replayed,
                recovery.bytes_truncated,
                recovery.last_lsn
            );
        }

        let mut index = HashMap::new();
        for record in records {
            match record.operation {
                Operation::Put { key, value } => {
                    index.insert(key, value);
                }
                Operation::Delete { key } => {
                    index.remove(&key);
                }
            }
        }

        let writer = LogWriter::open(
            &path,
            config.sync_strategy,
            recovery.last_lsn + 1,
            recovery.records_replayed,
        )?;
        let store = Self {
            index: RwLock::new(index),
            writer: Mutex::new(writer),
            recovery,
            compaction_threshold: config.compaction_threshold,
            sync_strategy: config.sync_strategy,
        };
        store.compact_if_needed(&mut store.writer.lock());

        Ok(store)
    }

    /// Rewrite the log down to the live keys when it is mostly dead records
    ///
    /// A failed rewrite leaves the current log in place.
    fn compact_if_needed(&self, writer: &mut LogWriter) {
        let records = writer.records();
        let live: Vec<Operation> = {
            let index = self.index.read();
            if records < self.compaction_threshold || records <= 2 * index.len() as u64 {
                return;
            }
            index
                .iter()
                .map(|(key, value)| Operation::Put {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect()
        };

        tracing::info!("Compacting log: {} records down to {} live keys", records, live.len());
        match LogWriter::rewrite(writer.path(), self.sync_strategy, live) {
            Ok(compacted) => *writer = compacted,
            Err(e) => tracing::warn!("Log compaction failed, keeping {}: {}", writer.path().display(), e),
        }
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    /// Force all appended records to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// What the last open recovered
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Path of the backing log file
    pub fn log_path(&self) -> PathBuf {
        self.writer.lock().path().to_path_buf()
    }
}

impl Storage for LogStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.index.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.append(Operation::Put {
            key: key.to_string(),
            value: value.to_vec(),
        })?;
        self.index.write().insert(key.to_string(), value.to_vec());
        self.compact_if_needed(&mut writer);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        if !self.index.read().contains_key(key) {
            return Ok(());
        }
        writer.append(Operation::Delete {
            key: key.to_string(),
        })?;
        self.index.write().remove(key);
        self.compact_if_needed(&mut writer);
        Ok(())
    }
}
