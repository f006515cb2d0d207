//! Peer Manager
//!
//! Outbound links from a session to other nodes, used for write replication.
//!
//! A link is only kept after the remote answered a PING handshake with HELO.
//! Replicated frames go through a bounded queue to a writer thread, so a slow
//! peer never stalls the session that owns it; a drain thread reads and
//! discards the peer's replies.

use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender, TrySendError};

use crate::config::Config;
use crate::error::{CarbonError, Result};
use crate::protocol::{read_response, write_transaction, Status, Transaction};
use super::HostAddr;

/// Largest reply payload read from a handshake target or a peer
///
/// Nodes only ever answer these with HELO, OPOK or a short FAIL message.
pub const PEER_REPLY_LIMIT: usize = 64 * 1024;

/// Connect to `addr` and complete a PING handshake
///
/// Returns the live stream and the round-trip time measured from before the
/// TCP connect until the HELO arrived. The stream keeps `timeout` as its
/// read and write timeout.
pub fn handshake(addr: &HostAddr, timeout: Duration) -> Result<(TcpStream, Duration)> {
    let timeout = timeout.max(Duration::from_millis(1));
    let started = Instant::now();

    let stream = connect(addr, timeout)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    write_transaction(&mut &stream, &Transaction::handshake())?;
    let response = read_response(&mut &stream, PEER_REPLY_LIMIT)?;
    if response.status != Status::Helo {
        return Err(CarbonError::PeerUnreachable {
            addr: addr.to_string(),
            reason: format!("answered {} instead of HELO", response.status),
        });
    }

    Ok((stream, started.elapsed()))
}

/// TCP connect with a timeout, trying every resolved address
fn connect(addr: &HostAddr, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for socket_addr in addr.resolve()? {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .map(CarbonError::Io)
        .unwrap_or_else(|| CarbonError::InvalidAddress(addr.to_string())))
}

/// Open a handshaken connection to a peer
///
/// Every failure is reported as `PeerUnreachable`.
pub fn connect_peer(addr: &HostAddr, timeout: Duration) -> Result<TcpStream> {
    match handshake(addr, timeout) {
        Ok((stream, _)) => Ok(stream),
        Err(e @ CarbonError::PeerUnreachable { .. }) => Err(e),
        Err(e) => Err(CarbonError::PeerUnreachable {
            addr: addr.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// A live replication link owned by one session
pub struct PeerLink {
    addr: HostAddr,
    queue: Option<Sender<Vec<u8>>>,
    queued_bytes: Arc<AtomicUsize>,
    max_queued_bytes: usize,
    stream: TcpStream,
    writer: Option<JoinHandle<()>>,
    drain: Option<JoinHandle<()>>,
}

impl PeerLink {
    /// Connect, handshake and start the link's worker threads
    pub fn connect(addr: &HostAddr, config: &Config) -> Result<Self> {
        let stream = connect_peer(addr, config.peer_timeout())?;
        Self::spawn(addr.clone(), stream, config)
    }

    fn spawn(addr: HostAddr, stream: TcpStream, config: &Config) -> Result<Self> {
        // Replies are drained until the socket closes; writes keep their timeout
        stream.set_read_timeout(None)?;

        let (queue, frames) = channel::bounded::<Vec<u8>>(config.peer_queue_depth.max(1));
        let queued_bytes = Arc::new(AtomicUsize::new(0));
        let write_half = stream.try_clone()?;
        let read_half = stream.try_clone()?;

        let name = addr.to_string();
        let pending = Arc::clone(&queued_bytes);
        let writer = thread::Builder::new()
            .name(format!("peer-writer-{}", name))
            .spawn(move || {
                let mut out = BufWriter::new(write_half);
                for frame in frames.iter() {
                    let sent = out.write_all(&frame).and_then(|_| {
                        if frames.is_empty() {
                            out.flush()
                        } else {
                            Ok(())
                        }
                    });
                    if let Err(e) = sent {
                        tracing::warn!("Replication write to peer {} failed: {}", name, e);
                        return;
                    }
                    pending.fetch_sub(frame.len(), Ordering::AcqRel);
                }
                let _ = out.flush();
            })?;

        let name = addr.to_string();
        let drain = thread::Builder::new()
            .name(format!("peer-drain-{}", name))
            .spawn(move || {
                let mut replies = BufReader::new(read_half);
                loop {
                    match read_response(&mut replies, PEER_REPLY_LIMIT) {
                        Ok(response) if response.status == Status::Fail => {
                            tracing::warn!(
                                "Peer {} rejected a replicated transaction: {}",
                                name,
                                response.message()
                            );
                        }
                        Ok(_) => {}
                        Err(CarbonError::Io(_)) => break,
                        Err(e) => {
                            tracing::warn!("Bad reply from peer {}: {}", name, e);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            addr,
            queue: Some(queue),
            queued_bytes,
            max_queued_bytes: config.peer_queue_bytes,
            stream,
            writer: Some(writer),
            drain: Some(drain),
        })
    }

    pub fn addr(&self) -> &HostAddr {
        &self.addr
    }

    /// Queue an encoded transaction without waiting for the peer
    ///
    /// Fails when the queue already holds `peer_queue_depth` frames or
    /// `peer_queue_bytes` bytes; an empty queue always takes one frame.
    pub fn forward(&self, frame: &[u8]) -> Result<()> {
        let queue = self.queue.as_ref().ok_or_else(|| self.unreachable("link closed"))?;

        let queued = self.queued_bytes.load(Ordering::Acquire);
        if queued > 0 && queued.saturating_add(frame.len()) > self.max_queued_bytes {
            return Err(self.unreachable("replication queue over its byte limit"));
        }

        self.queued_bytes.fetch_add(frame.len(), Ordering::AcqRel);
        let sent = queue.try_send(frame.to_vec());
        if sent.is_err() {
            self.queued_bytes.fetch_sub(frame.len(), Ordering::AcqRel);
        }
        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(self.unreachable("replication queue full")),
            Err(TrySendError::Disconnected(_)) => Err(self.unreachable("replication writer stopped")),
        }
    }

    /// Tear the link down without flushing queued frames
    pub fn abort(self) {
        self.shutdown_socket();
    }

    /// Flush queued frames, then close the link
    pub fn close(self) {
        drop(self);
    }

    fn unreachable(&self, reason: &str) -> CarbonError {
        CarbonError::PeerUnreachable {
            addr: self.addr.to_string(),
            reason: reason.to_string(),
        }
    }

    fn shutdown_socket(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != ErrorKind::NotConnected {
                tracing::warn!("Error closing connection to peer {}: {}", self.addr, e);
            }
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        // Closing the queue lets the writer finish what is already buffered
        drop(self.queue.take());
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                tracing::warn!("Writer thread for peer {} panicked", self.addr);
            }
        }

        self.shutdown_socket();
        if let Some(drain) = self.drain.take() {
            if drain.join().is_err() {
                tracing::warn!("Drain thread for peer {} panicked", self.addr);
            }
        }

        tracing::info!("Closed connection to peer {}", self.addr);
    }
}
