//! Configuration for CarbonDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CarbonError, Result};
use crate::protocol::DEFAULT_PORT;

/// Main configuration for a CarbonDB node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the storage log
    /// Internal structure:
    ///   {data_dir}/
    ///     └── carbon.log       (append-only record log)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    /// Minimum record count before compaction is considered
    pub compaction_threshold: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Session read timeout (milliseconds, 0 = wait forever)
    pub read_timeout_ms: u64,

    /// Session write timeout (milliseconds, 0 = wait forever)
    pub write_timeout_ms: u64,

    /// Largest value a transaction may declare (bytes)
    pub max_value_size: usize,

    // -------------------------------------------------------------------------
    // Peer Configuration
    // -------------------------------------------------------------------------
    /// Connect, handshake and write timeout for peer links (milliseconds)
    pub peer_timeout_ms: u64,

    /// Frames buffered per peer before the peer is dropped
    pub peer_queue_depth: usize,

    /// Bytes buffered per peer before the peer is dropped
    /// (a single frame is always accepted by an empty queue)
    pub peer_queue_bytes: usize,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNRecords { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./carbon_data"),
            sync_strategy: SyncStrategy::EveryNRecords { count: 100 },
            compaction_threshold: 1024,
            listen_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            max_value_size: 64 * 1024 * 1024, // 64 MB
            peer_timeout_ms: 3000,
            peer_queue_depth: 1024,
            peer_queue_bytes: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Peer connect/handshake/write timeout as a Duration
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Reject settings a node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(CarbonError::Config("max_connections must be at least 1".into()));
        }
        if self.peer_timeout_ms == 0 {
            return Err(CarbonError::Config("peer_timeout_ms must be positive".into()));
        }
        if self.peer_queue_depth == 0 {
            return Err(CarbonError::Config("peer_queue_depth must be at least 1".into()));
        }
        if self.peer_queue_bytes == 0 {
            return Err(CarbonError::Config("peer_queue_bytes must be positive".into()));
        }
        if let SyncStrategy::EveryNRecords { count: 0 } = self.sync_strategy {
            return Err(CarbonError::Config("sync count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the record count at which compaction is considered
    pub fn compaction_threshold(mut self, records: u64) -> Self {
        self.config.compaction_threshold = records;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Listen on all interfaces at the given port
    pub fn port(mut self, port: u16) -> Self {
        self.config.listen_addr = format!("0.0.0.0:{}", port);
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the largest accepted value size (in bytes)
    pub fn max_value_size(mut self, bytes: usize) -> Self {
        self.config.max_value_size = bytes;
        self
    }

    /// Set the peer timeout (in milliseconds)
    pub fn peer_timeout_ms(mut self, ms: u64) -> Self {
        self.config.peer_timeout_ms = ms;
        self
    }

    /// Set the per-peer replication queue depth
    pub fn peer_queue_depth(mut self, depth: usize) -> Self {
        self.config.peer_queue_depth = depth;
        self
    }

    /// Set the per-peer replication queue size (in bytes)
    pub fn peer_queue_bytes(mut self, bytes: usize) -> Self {
        self.config.peer_queue_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Client-side configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connect timeout per candidate host (milliseconds)
    pub connect_timeout_ms: u64,

    /// Read/write timeout on the active connection (milliseconds, 0 = none)
    pub io_timeout_ms: u64,

    /// Largest response payload accepted from a node (bytes)
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            io_timeout_ms: 10_000,
            max_response_size: 64 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms))
    }
}
