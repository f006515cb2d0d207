//! Node addresses
//!
//! `host`, `host:port` and `[v6-host]:port` forms, defaulting to port 13051.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{CarbonError, Result};
use crate::protocol::DEFAULT_PORT;

/// Address of a CarbonDB node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddr {
    host: String,
    port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `[host]:port`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = || CarbonError::InvalidAddress(input.to_string());

        if input.is_empty() {
            return Err(invalid());
        }

        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = match tail {
                "" => DEFAULT_PORT,
                _ => tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(invalid)?,
            };
            return Ok(Self::new(host, port));
        }

        match input.rsplit_once(':') {
            // A bare IPv6 literal has several colons and no port
            Some((host, _)) if host.contains(':') => Ok(Self::new(input, DEFAULT_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(invalid());
                }
                let port = port.parse().map_err(|_| invalid())?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(input, DEFAULT_PORT)),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to socket addresses (DNS lookup for names)
    pub fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(CarbonError::InvalidAddress(format!("{} resolved to nothing", self)));
        }
        Ok(addrs)
    }
}

impl FromStr for HostAddr {
    type Err = CarbonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for HostAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Split a PEER value into address strings
///
/// Clients JSON-encode the list, so surrounding quotes are dropped.
pub fn split_peer_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .trim()
        .trim_matches('"')
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

/// Join addresses into a PEER value
pub fn join_peer_list<'a>(hosts: impl IntoIterator<Item = &'a HostAddr>) -> String {
    hosts
        .into_iter()
        .map(HostAddr::to_string)
        .collect::<Vec<_>>()
        .join("/")
}
