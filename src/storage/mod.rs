//! Storage Module
//!
//! The durable key → value mapping behind every session.
//!
//! ## Responsibilities
//! - Point reads, upserts and deletes keyed by UTF-8 strings
//! - Safe concurrent access from every session thread
//! - Durability across restarts (`LogStore`)
//!
//! ## Implementations
//! - [`LogStore`]: append-only record log replayed into an in-memory index
//! - [`MemoryStore`]: non-durable map, for tests and embedding

mod log;
mod memory;

pub use log::{LogRecord, LogStore, Operation, RecoveryStats};
pub use memory::MemoryStore;

use crate::error::Result;

/// Key/value storage consumed by the session handler
///
/// Writes are last-writer-wins; implementations serialize them internally.
pub trait Storage: Send + Sync {
    /// Fetch the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the value stored under `key`
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&self, key: &str) -> Result<()>;
}
