//! Client Module
//!
//! Blocking client for a set of CarbonDB nodes.
//!
//! On connect the client pings every configured host, keeps the fastest
//! one and, when several hosts were given, tells the winner about the
//! others with a PEER transaction so that its writes are replicated to them.
//! Values are JSON-encoded on the way in and decoded on the way out.
//!
//! A `Client` holds exactly one connection and is not meant to be shared
//! between threads without external locking.

mod sandbox;
mod selector;

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{CarbonError, Result};
use crate::network::{join_peer_list, HostAddr};
use crate::protocol::{
    read_response, write_transaction, Response, Status, Transaction, TransactionType, HANDSHAKE_KEY,
};

pub use sandbox::Sandbox;
pub use selector::{select_host, Selection};

/// Key carried by the PEER transaction sent after selection
const PEER_LIST_KEY: &str = "LIST";

/// Key carried by AUTH transactions
const AUTH_KEY: &str = "PSW";

/// The active connection to the selected node
struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    host: HostAddr,
    latency: Duration,
    max_response_size: usize,
}

impl Connection {
    fn open(selection: Selection, config: &ClientConfig) -> Result<Self> {
        selection.stream.set_read_timeout(config.io_timeout())?;
        selection.stream.set_write_timeout(config.io_timeout())?;
        let read_stream = selection.stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(selection.stream),
            host: selection.host,
            latency: selection.latency,
            max_response_size: config.max_response_size,
        })
    }

    /// Send one transaction and wait for its full response
    fn exchange(&mut self, transaction: &Transaction) -> Result<Response> {
        write_transaction(&mut self.writer, transaction)?;
        read_response(&mut self.reader, self.max_response_size)
    }
}

/// Client for a CarbonDB cluster
pub struct Client {
    hosts: Vec<HostAddr>,
    config: ClientConfig,
    connection: Option<Connection>,
}

impl Client {
    /// Connect to the fastest of `hosts` using default settings
    pub fn connect<I, S>(hosts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_config(hosts, ClientConfig::default())
    }

    /// Connect to the fastest of `hosts`
    pub fn with_config<I, S>(hosts: I, config: ClientConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| HostAddr::parse(host.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut client = Self {
            hosts,
            config,
            connection: None,
        };
        client.reselect()?;
        Ok(client)
    }

    /// Run host selection again, replacing the active connection
    pub fn reselect(&mut self) -> Result<()> {
        self.connection = None;

        let selection = select_host(&self.hosts, self.config.connect_timeout())?;
        let chosen = selection.host.clone();
        self.connection = Some(Connection::open(selection, &self.config)?);

        if self.hosts.len() > 1 {
            let siblings = join_peer_list(self.hosts.iter().filter(|host| **host != chosen));
            let value = serde_json::to_vec(&siblings)?;
            let response = self.transact(TransactionType::Peer, PEER_LIST_KEY, Some(value.as_slice()))?;
            if response.status == Status::Fail {
                tracing::warn!("Host '{}' refused the peer list: {}", chosen, response.message());
            }
        }

        Ok(())
    }

    /// Configured candidate hosts
    pub fn hosts(&self) -> &[HostAddr] {
        &self.hosts
    }

    /// Host of the active connection
    pub fn active_host(&self) -> Option<&HostAddr> {
        self.connection.as_ref().map(|c| &c.host)
    }

    /// Handshake latency measured when the active host was selected
    pub fn latency(&self) -> Option<Duration> {
        self.connection.as_ref().map(|c| c.latency)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drop the active connection
    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    /// Send a raw transaction and return the node's response
    ///
    /// A transport failure drops the active connection; call `reselect()`
    /// before trying again.
    pub fn transact(
        &mut self,
        kind: TransactionType,
        key: &str,
        value: Option<&[u8]>,
    ) -> Result<Response> {
        let connection = self.connection.as_mut().ok_or(CarbonError::NoAvailableNodes)?;
        let transaction = Transaction::new(kind, key, value.unwrap_or_default());
        tracing::trace!("Sending {} {} to {}", kind, transaction.id, connection.host);

        let outcome = connection.exchange(&transaction);
        if let Err(
            CarbonError::Io(_)
            | CarbonError::MalformedHeader { .. }
            | CarbonError::UnknownStatus(_)
            | CarbonError::ValueTooLarge { .. },
        ) = outcome
        {
            self.connection = None;
        }
        outcome
    }

    /// Round trip a PING
    pub fn ping(&mut self) -> Result<Duration> {
        let started = Instant::now();
        let response = self.transact(TransactionType::Ping, HANDSHAKE_KEY, None)?;
        if response.status != Status::Helo {
            return Err(CarbonError::Rejected(response.message()));
        }
        Ok(started.elapsed())
    }

    /// Store any JSON-serializable value under `key`
    pub fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        accepted(self.transact(TransactionType::Writ, key, Some(value.as_slice()))?)?;
        Ok(())
    }

    /// Read the value stored under `key`; `None` when it is absent
    pub fn read<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let response = accepted(self.transact(TransactionType::Read, key, None)?)?;
        Ok(serde_json::from_slice(&response.payload)?)
    }

    /// Remove `key`
    pub fn delete(&mut self, key: &str) -> Result<()> {
        accepted(self.transact(TransactionType::Wipe, key, None)?)?;
        Ok(())
    }

    /// Authenticate with the active node
    pub fn auth(&mut self, password: &str) -> Result<()> {
        let value = serde_json::to_vec(password)?;
        accepted(self.transact(TransactionType::Auth, AUTH_KEY, Some(value.as_slice()))?)?;
        Ok(())
    }

    /// Load the collection stored under `name` for buffered edits
    pub fn sandbox(&mut self, name: &str) -> Result<Sandbox> {
        let values = self.read::<Map<String, Value>>(name)?.unwrap_or_default();
        Ok(Sandbox::new(name, values))
    }
}

/// Turn a FAIL response into an error
fn accepted(response: Response) -> Result<Response> {
    match response.status {
        Status::Fail => Err(CarbonError::Rejected(response.message())),
        _ => Ok(response),
    }
}
