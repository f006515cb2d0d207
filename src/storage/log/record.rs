//! Log record definitions
//!
//! Defines the structure and framing of individual log records.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CarbonError, Result};

/// Record header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single record in the storage log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to apply
    pub operation: Operation,

    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or replace a key
    Put { key: String, value: Vec<u8> },

    /// Remove a key
    Delete { key: String },
}

impl LogRecord {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Frame the record: lsn (8) + crc (4) + len (4) + bincode data
    pub fn encode(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len())
            .map_err(|_| CarbonError::Serialization(format!("record too large: {} bytes", data.len())))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode one framed record from the front of `bytes`
    ///
    /// Returns the record and the number of bytes it occupied. A frame that is
    /// cut short or fails its checksum is `LogCorruption`.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(CarbonError::LogCorruption(format!(
                "partial header: {} of {} bytes",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let lsn = u64::from_le_bytes(bytes[0..8].try_into().map_err(corrupt)?);
        let crc = u32::from_le_bytes(bytes[8..12].try_into().map_err(corrupt)?);
        let len = u32::from_le_bytes(bytes[12..16].try_into().map_err(corrupt)?) as usize;

        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(CarbonError::LogCorruption(format!(
                "partial record at lsn {}: {} of {} data bytes",
                lsn,
                bytes.len() - HEADER_SIZE,
                len
            )));
        }

        let data = &bytes[HEADER_SIZE..end];
        if crc32fast::hash(data) != crc {
            return Err(CarbonError::LogCorruption(format!("checksum mismatch at lsn {}", lsn)));
        }

        let record: LogRecord = bincode::deserialize(data)?;
        if record.lsn != lsn {
            return Err(CarbonError::LogCorruption(format!(
                "lsn mismatch: header {} vs record {}",
                lsn, record.lsn
            )));
        }

        Ok((record, end))
    }

    /// Key the operation touches
    pub fn key(&self) -> &str {
        match &self.operation {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

fn corrupt(err: std::array::TryFromSliceError) -> CarbonError {
    CarbonError::LogCorruption(err.to_string())
}
