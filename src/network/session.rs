//! Session Handler
//!
//! Serves one accepted connection.
//!
//! ## Lifecycle
//! ```text
//! AWAITING_HEADER ─► READING_KEY ─► READING_VALUE ─► DISPATCHING ─┐
//!        ▲                                                         │
//!        └─────────────────────────────────────────────────────────┘
//! CLOSED: end of stream, stream error or a malformed frame
//! ```
//!
//! Peers opened by PEER transactions belong to the session and are closed
//! with it. WRIT and WIPE are forwarded to them after the local write
//! succeeds; their replies are never waited for.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{CarbonError, Result};
use crate::protocol::{
    encode_transaction, read_transaction, write_response, Frame, Response, Transaction,
    TransactionType, AUTH_UNSUPPORTED_MESSAGE, INVALID_KEY_MESSAGE, NULL_VALUE,
    STORAGE_FAILURE_MESSAGE, UNKNOWN_TYPE_MESSAGE,
};
use crate::storage::Storage;
use super::address::split_peer_list;
use super::{HostAddr, PeerLink};

/// State for a single client connection
pub struct Session {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared storage backend
    storage: Arc<dyn Storage>,

    /// Node configuration (timeouts, limits)
    config: Arc<Config>,

    /// Replication links opened during this session, in order
    peers: Vec<PeerLink>,

    /// Remote address for logging
    peer_addr: String,
}

impl Session {
    /// Create a new session for an accepted stream
    pub fn new(stream: TcpStream, storage: Arc<dyn Storage>, config: Arc<Config>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            storage,
            config,
            peers: Vec::new(),
            peer_addr,
        })
    }

    /// Serve transactions until the client goes away, then close owned peers
    pub fn run(mut self) -> Result<()> {
        tracing::info!("Connection established from {}", self.peer_addr);

        let outcome = self.serve();

        tracing::info!("Connection lost from {}", self.peer_addr);
        for peer in self.peers.drain(..) {
            tracing::info!("Closing peer {} owned by dead session {}", peer.addr(), self.peer_addr);
            peer.close();
        }

        outcome
    }

    /// Number of live peers held by this session
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn serve(&mut self) -> Result<()> {
        loop {
            let frame = match read_transaction(&mut self.reader, self.config.max_value_size) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(CarbonError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => {
                    // Framing is lost; nothing sensible can be answered
                    tracing::warn!("Dropping client {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let started = Instant::now();
            let response = self.dispatch(&frame);

            tracing::debug!(
                "Code: {} ({}) | Response: {} | Size: {}b | Transaction: {} | Elapsed: {}μs",
                frame.header.type_code,
                frame.kind().map(TransactionType::name).unwrap_or("????"),
                response.status,
                response.payload.len(),
                frame.id(),
                started.elapsed().as_micros()
            );

            if let Err(e) = write_response(&mut self.writer, &response) {
                if let CarbonError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Apply one transaction and build its response
    fn dispatch(&mut self, frame: &Frame) -> Response {
        let kind = match frame.kind() {
            Some(kind) => kind,
            None => return Response::fail(UNKNOWN_TYPE_MESSAGE),
        };

        match kind {
            TransactionType::Ping => Response::helo(),
            TransactionType::Auth => Response::fail(AUTH_UNSUPPORTED_MESSAGE),
            TransactionType::Peer => {
                self.add_peers(&frame.value);
                Response::done()
            }
            TransactionType::Writ | TransactionType::Read | TransactionType::Wipe => {
                let key = match std::str::from_utf8(&frame.key) {
                    Ok(key) => key,
                    Err(_) => return Response::fail(INVALID_KEY_MESSAGE),
                };
                self.apply(kind, key, &frame.value)
            }
        }
    }

    fn apply(&mut self, kind: TransactionType, key: &str, value: &[u8]) -> Response {
        let applied = match kind {
            TransactionType::Writ => self.storage.put(key, value).map(|_| Response::done()),
            TransactionType::Wipe => self.storage.delete(key).map(|_| Response::done()),
            _ => self.storage.get(key).map(|found| match found {
                Some(value) => Response::ok(value),
                None => Response::ok(NULL_VALUE),
            }),
        };

        match applied {
            Ok(response) => {
                if kind.is_replicated() {
                    let forwarded = if kind == TransactionType::Wipe { &[][..] } else { value };
                    self.replicate(kind, key, forwarded);
                }
                response
            }
            Err(e) => {
                tracing::error!("Storage failure on {} {:?} from {}: {}", kind, key, self.peer_addr, e);
                Response::fail(STORAGE_FAILURE_MESSAGE)
            }
        }
    }

    /// Handle a PEER transaction: connect to every listed address
    ///
    /// Unreachable peers are logged and skipped.
    fn add_peers(&mut self, value: &[u8]) {
        let list = String::from_utf8_lossy(value);
        for entry in split_peer_list(&list) {
            let link = HostAddr::parse(entry).and_then(|addr| PeerLink::connect(&addr, &self.config));
            match link {
                Ok(link) => {
                    tracing::info!("Connection to new peer established, host address is {}", link.addr());
                    self.peers.push(link);
                }
                Err(e) => {
                    tracing::warn!("Failed to establish connection to peer {}: {}", entry, e);
                }
            }
        }
    }

    /// Forward a mutation to every peer, dropping peers that cannot keep up
    fn replicate(&mut self, kind: TransactionType, key: &str, value: &[u8]) {
        if self.peers.is_empty() {
            return;
        }

        let frame = match encode_transaction(&Transaction::new(kind, key, value)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Cannot encode {} for replication: {}", kind, e);
                return;
            }
        };

        for peer in std::mem::take(&mut self.peers) {
            match peer.forward(&frame) {
                Ok(()) => self.peers.push(peer),
                Err(e) => {
                    tracing::warn!("Dropping peer from session {}: {}", self.peer_addr, e);
                    peer.abort();
                }
            }
        }
    }

    /// Get the remote address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
