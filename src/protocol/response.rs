//! Response definitions
//!
//! Represents replies to transactions.

use std::fmt;

use crate::error::{CarbonError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Helo = 0,
    Opok = 1,
    Fail = 2,
}

impl TryFrom<u8> for Status {
    type Error = CarbonError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Status::Helo),
            1 => Ok(Status::Opok),
            2 => Ok(Status::Fail),
            other => Err(CarbonError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Helo => "HELO",
            Status::Opok => "OPOK",
            Status::Fail => "FAIL",
        })
    }
}

/// A response to send back over a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Payload (READ value or FAIL message, usually empty otherwise)
    pub payload: Vec<u8>,
}

impl Response {
    /// Handshake acknowledgement
    pub fn helo() -> Self {
        Self {
            status: Status::Helo,
            payload: Vec::new(),
        }
    }

    /// Create an OPOK response with a payload
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Status::Opok,
            payload: payload.into(),
        }
    }

    /// Create an OPOK response with no payload
    pub fn done() -> Self {
        Self::ok(Vec::new())
    }

    /// Create a FAIL response carrying a message
    pub fn fail(message: &str) -> Self {
        Self {
            status: Status::Fail,
            payload: message.as_bytes().to_vec(),
        }
    }

    /// Payload rendered as text (for FAIL messages)
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Decoded fixed-size response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: Status,
    pub payload_len: u32,
}
