//! Protocol Module
//!
//! Defines the wire protocol spoken between clients, nodes and peers.
//!
//! ## Protocol Format
//!
//! ### Transaction (Request) Format
//! ```text
//! ┌──────────┬──────────┬────────────┬────────────┬───────┬─────────┐
//! │  Id (21) │ Type (1) │ KeyLen (4) │ ValLen (4) │  Key  │  Value  │
//! └──────────┴──────────┴────────────┴────────────┴───────┴─────────┘
//! ```
//!
//! ### Transaction Types
//! - 0: PING  - handshake / liveness check
//! - 1: WRIT  - upsert key → value (replicated)
//! - 2: READ  - fetch value ("null" when absent)
//! - 3: WIPE  - delete key (replicated)
//! - 4: AUTH  - always refused
//! - 5: PEER  - value is a `/`-joined list of peer addresses
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0: HELO (handshake acknowledged)
//! - 1: OPOK
//! - 2: FAIL (payload carries a message)

mod transaction;
mod response;
mod codec;

pub use transaction::{Frame, Transaction, TransactionHeader, TransactionId, TransactionType};
pub use response::{Response, ResponseHeader, Status};
pub use codec::{
    decode_header, decode_response_header, encode_response, encode_transaction,
    read_response, read_transaction, write_response, write_transaction,
    MAX_KEY_LEN, RESPONSE_HEADER_SIZE, TRANSACTION_HEADER_SIZE,
};

/// Default TCP port for a CarbonDB node
pub const DEFAULT_PORT: u16 = 13051;

/// Key sent with handshake PINGs
pub const HANDSHAKE_KEY: &str = "TIME";

/// FAIL message for AUTH transactions
pub const AUTH_UNSUPPORTED_MESSAGE: &str = "Authentication not supported on this database.";

/// FAIL message for unrecognized transaction type codes
pub const UNKNOWN_TYPE_MESSAGE: &str = "The specified transaction type does not exist.";

/// FAIL message when the storage adapter errors
pub const STORAGE_FAILURE_MESSAGE: &str = "An internal storage error occurred.";

/// FAIL message for keys that are not UTF-8
pub const INVALID_KEY_MESSAGE: &str = "The specified key is not valid UTF-8.";

/// Literal payload returned by READ for an absent key
pub const NULL_VALUE: &[u8] = b"null";
