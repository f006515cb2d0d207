//! Transaction definitions
//!
//! Represents requests from clients and replicating peers.

use std::fmt;

use crate::error::{CarbonError, Result};

/// Transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransactionType {
    Ping = 0,
    Writ = 1,
    Read = 2,
    Wipe = 3,
    Auth = 4,
    Peer = 5,
}

impl TransactionType {
    /// Four-letter protocol name
    pub fn name(self) -> &'static str {
        match self {
            TransactionType::Ping => "PING",
            TransactionType::Writ => "WRIT",
            TransactionType::Read => "READ",
            TransactionType::Wipe => "WIPE",
            TransactionType::Auth => "AUTH",
            TransactionType::Peer => "PEER",
        }
    }

    /// Whether the type mutates storage and is forwarded to peers
    pub fn is_replicated(self) -> bool {
        matches!(self, TransactionType::Writ | TransactionType::Wipe)
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = CarbonError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TransactionType::Ping),
            1 => Ok(TransactionType::Writ),
            2 => Ok(TransactionType::Read),
            3 => Ok(TransactionType::Wipe),
            4 => Ok(TransactionType::Auth),
            5 => Ok(TransactionType::Peer),
            other => Err(CarbonError::UnknownTransactionType(other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const ID_LEN: usize = 21;

/// Opaque 21-byte ASCII correlation token
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId([u8; ID_LEN]);

impl TransactionId {
    pub const LEN: usize = ID_LEN;

    /// Generate a fresh random id
    pub fn generate() -> Self {
        let id = nanoid::nanoid!(ID_LEN);
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&id.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    /// Build an id from exactly 21 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; Self::LEN] = bytes
            .try_into()
            .map_err(|_| CarbonError::InvalidTransactionId(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self)
    }
}

/// A transaction to be sent
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionType,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Transaction {
    /// Create a transaction with a freshly generated id
    pub fn new(kind: TransactionType, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id: TransactionId::generate(),
            kind,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Handshake PING used for liveness and latency checks
    pub fn handshake() -> Self {
        Self::new(TransactionType::Ping, super::HANDSHAKE_KEY, Vec::new())
    }
}

/// Decoded fixed-size transaction header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHeader {
    pub id: TransactionId,
    /// Raw type code; unknown codes are answered, not rejected
    pub type_code: u8,
    pub key_len: u32,
    pub value_len: u32,
}

/// A transaction read off the wire
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: TransactionHeader,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Frame {
    /// Transaction type, if the code is known
    pub fn kind(&self) -> Option<TransactionType> {
        TransactionType::try_from(self.header.type_code).ok()
    }

    pub fn id(&self) -> TransactionId {
        self.header.id
    }
}
