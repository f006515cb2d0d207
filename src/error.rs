//! Error types for CarbonDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CarbonError
pub type Result<T> = std::result::Result<T, CarbonError>;

/// Unified error type for CarbonDB operations
#[derive(Debug, Error)]
pub enum CarbonError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Malformed header: expected {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    #[error("Key too long: {0} bytes (max 255)")]
    KeyTooLong(usize),

    #[error("Value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    #[error("Invalid transaction id: expected 21 bytes, got {0}")]
    InvalidTransactionId(usize),

    #[error("Unknown transaction type: 0x{0:02x}")]
    UnknownTransactionType(u8),

    #[error("Unknown response status: 0x{0:02x}")]
    UnknownStatus(u8),

    // -------------------------------------------------------------------------
    // Cluster Errors
    // -------------------------------------------------------------------------
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Peer {addr} unreachable: {reason}")]
    PeerUnreachable { addr: String, reason: String },

    #[error("No available nodes")]
    NoAvailableNodes,

    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Log corruption detected: {0}")]
    LogCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for CarbonError {
    fn from(err: bincode::Error) -> Self {
        CarbonError::Serialization(err.to_string())
    }
}
