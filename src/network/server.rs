//! TCP Server
//!
//! Accepts connections and runs each session on its own thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::storage::Storage;
use super::Session;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for a CarbonDB node
pub struct Server {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listener described by `config`
    pub fn bind(config: Config, storage: Arc<dyn Storage>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Polled so that shutdown() is noticed without a wake-up connection
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config: Arc::new(config),
            storage,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.spawn_session(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Per-connection accept failures (e.g. reset before accept) are not fatal
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Accept loop stopped");
        Ok(())
    }

    /// Signal the server to stop accepting connections
    ///
    /// Sessions already running finish when their clients disconnect.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Flag that stops the accept loop when set, for use from another thread
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Number of sessions currently being served
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                addr,
                self.config.max_connections
            );
            return;
        }

        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Cannot configure stream from {}: {}", addr, e);
            return;
        }

        let session = match Session::new(stream, Arc::clone(&self.storage), Arc::clone(&self.config)) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Cannot start session for {}: {}", addr, e);
                return;
            }
        };

        let guard = ActiveGuard::new(Arc::clone(&self.active));
        let spawned = thread::Builder::new()
            .name(format!("session-{}", addr))
            .spawn(move || {
                let _guard = guard;
                if let Err(e) = session.run() {
                    tracing::debug!("Session {} ended with error: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Cannot spawn session thread for {}: {}", addr, e);
        }
    }
}

/// Counts a session as active for as long as it lives
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
