//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Transaction Header (30 bytes)
//! ```text
//! ┌──────────┬──────────┬────────────┬────────────┐
//! │  Id (21) │ Type (1) │ KeyLen (4) │ ValLen (4) │
//! └──────────┴──────────┴────────────┴────────────┘
//! ```
//! followed by exactly `KeyLen` key bytes and `ValLen` value bytes.
//!
//! ### Response Header (5 bytes)
//! ```text
//! ┌──────────┬──────────┐
//! │Status(1) │ Len (4)  │
//! └──────────┴──────────┘
//! ```
//! followed by exactly `Len` payload bytes.
//!
//! All integers are big-endian and unsigned. There is no padding and no
//! terminator; a length that disagrees with the bytes sent desyncs the stream.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut};

use crate::error::{CarbonError, Result};
use super::{Frame, Response, ResponseHeader, Status, Transaction, TransactionHeader, TransactionId};

/// Transaction header size: id (21) + type (1) + key_len (4) + value_len (4)
pub const TRANSACTION_HEADER_SIZE: usize = TransactionId::LEN + 1 + 4 + 4;

/// Response header size: status (1) + payload_len (4)
pub const RESPONSE_HEADER_SIZE: usize = 5;

/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

// =============================================================================
// Transaction Encoding/Decoding
// =============================================================================

/// Encode a transaction to bytes
///
/// Format: header (30) + key + value
pub fn encode_transaction(transaction: &Transaction) -> Result<Vec<u8>> {
    let key = transaction.key.as_slice();
    let value = transaction.value.as_slice();

    if key.len() > MAX_KEY_LEN {
        return Err(CarbonError::KeyTooLong(key.len()));
    }
    let value_len = u32::try_from(value.len()).map_err(|_| CarbonError::ValueTooLarge {
        size: value.len(),
        max: u32::MAX as usize,
    })?;

    let mut message = Vec::with_capacity(TRANSACTION_HEADER_SIZE + key.len() + value.len());
    message.put_slice(transaction.id.as_bytes());
    message.put_u8(transaction.kind as u8);
    message.put_u32(key.len() as u32);
    message.put_u32(value_len);
    message.put_slice(key);
    message.put_slice(value);

    Ok(message)
}

/// Decode a transaction header from the first 30 bytes
///
/// Unknown type codes are passed through untouched.
pub fn decode_header(bytes: &[u8]) -> Result<TransactionHeader> {
    if bytes.len() < TRANSACTION_HEADER_SIZE {
        return Err(CarbonError::MalformedHeader {
            expected: TRANSACTION_HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut buf = &bytes[..TRANSACTION_HEADER_SIZE];
    let id = TransactionId::from_bytes(&buf[..TransactionId::LEN])?;
    buf.advance(TransactionId::LEN);

    let type_code = buf.get_u8();
    let key_len = buf.get_u32();
    let value_len = buf.get_u32();

    if key_len as usize > MAX_KEY_LEN {
        return Err(CarbonError::KeyTooLong(key_len as usize));
    }

    Ok(TransactionHeader {
        id,
        type_code,
        key_len,
        value_len,
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = response.payload.as_slice();
    let payload_len = u32::try_from(payload.len()).map_err(|_| CarbonError::ValueTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut message = Vec::with_capacity(RESPONSE_HEADER_SIZE + payload.len());
    message.put_u8(response.status as u8);
    message.put_u32(payload_len);
    message.put_slice(payload);

    Ok(message)
}

/// Decode a response header from the first 5 bytes
pub fn decode_response_header(bytes: &[u8]) -> Result<ResponseHeader> {
    if bytes.len() < RESPONSE_HEADER_SIZE {
        return Err(CarbonError::MalformedHeader {
            expected: RESPONSE_HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let mut buf = &bytes[..RESPONSE_HEADER_SIZE];
    let status = Status::try_from(buf.get_u8())?;
    let payload_len = buf.get_u32();

    Ok(ResponseHeader {
        status,
        payload_len,
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Fill `buf` from the stream
///
/// Returns the number of bytes read, which is short only when the stream ended.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Read a complete transaction from a stream
///
/// Returns `Ok(None)` when the stream ends cleanly before a new header.
/// A header cut short is `MalformedHeader`.
pub fn read_transaction<R: Read>(reader: &mut R, max_value_size: usize) -> Result<Option<Frame>> {
    let mut header = [0u8; TRANSACTION_HEADER_SIZE];
    match fill(reader, &mut header)? {
        0 => return Ok(None),
        n if n < TRANSACTION_HEADER_SIZE => {
            return Err(CarbonError::MalformedHeader {
                expected: TRANSACTION_HEADER_SIZE,
                actual: n,
            })
        }
        _ => {}
    }
    let header = decode_header(&header)?;

    if header.value_len as usize > max_value_size {
        return Err(CarbonError::ValueTooLarge {
            size: header.value_len as usize,
            max: max_value_size,
        });
    }

    let mut key = vec![0u8; header.key_len as usize];
    reader.read_exact(&mut key)?;

    let mut value = vec![0u8; header.value_len as usize];
    reader.read_exact(&mut value)?;

    Ok(Some(Frame { header, key, value }))
}

/// Write a transaction to a stream
pub fn write_transaction<W: Write>(writer: &mut W, transaction: &Transaction) -> Result<()> {
    let bytes = encode_transaction(transaction)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
///
/// A declared payload over `max_payload_size` is `ValueTooLarge` and nothing
/// is allocated for it.
pub fn read_response<R: Read>(reader: &mut R, max_payload_size: usize) -> Result<Response> {
    let mut header = [0u8; RESPONSE_HEADER_SIZE];
    match fill(reader, &mut header)? {
        0 => {
            return Err(CarbonError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed before response",
            )))
        }
        n if n < RESPONSE_HEADER_SIZE => {
            return Err(CarbonError::MalformedHeader {
                expected: RESPONSE_HEADER_SIZE,
                actual: n,
            })
        }
        _ => {}
    }
    let header = decode_response_header(&header)?;

    if header.payload_len as usize > max_payload_size {
        return Err(CarbonError::ValueTooLarge {
            size: header.payload_len as usize,
            max: max_payload_size,
        });
    }

    let mut payload = vec![0u8; header.payload_len as usize];
    reader.read_exact(&mut payload)?;

    Ok(Response {
        status: header.status,
        payload,
    })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
