//! Client Host Selector
//!
//! Pings every candidate host at once and keeps the fastest responder.

use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use crate::error::{CarbonError, Result};
use crate::network::{handshake, HostAddr};

/// The winning host of a selection round
#[derive(Debug)]
pub struct Selection {
    /// Live, handshaken connection to the winner
    pub stream: TcpStream,

    /// Address of the winner
    pub host: HostAddr,

    /// Position of the winner in the candidate list
    pub index: usize,

    /// Connect + PING round trip of the winner
    pub latency: Duration,
}

/// Pick the lowest-latency host that answers the handshake
///
/// All hosts are pinged concurrently; every handshake finishes (or times out)
/// before the decision. Ties go to the host listed first. Every responsive
/// host other than the winner is disconnected before returning.
pub fn select_host(hosts: &[HostAddr], timeout: Duration) -> Result<Selection> {
    let (results, outcomes) = channel::unbounded();

    thread::scope(|scope| {
        for (index, host) in hosts.iter().enumerate() {
            let results = results.clone();
            scope.spawn(move || {
                let _ = results.send((index, handshake(host, timeout)));
            });
        }
    });
    drop(results);

    let mut candidates = Vec::with_capacity(hosts.len());
    for (index, outcome) in outcomes.iter() {
        match outcome {
            Ok((stream, latency)) => {
                tracing::debug!(
                    "[ACK] Host '{}' is up and response latency was {:.2}ms",
                    hosts[index],
                    latency.as_secs_f64() * 1000.0
                );
                candidates.push((latency, index, stream));
            }
            Err(e) => {
                tracing::debug!("[ACK] The specified host '{}' is unreachable: {}", hosts[index], e);
            }
        }
    }

    candidates.sort_by_key(|(latency, index, _)| (*latency, *index));
    let mut ranked = candidates.into_iter();
    let (latency, index, stream) = ranked.next().ok_or(CarbonError::NoAvailableNodes)?;

    // Kill off the slower nodes
    for (_, loser, stream) in ranked {
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            tracing::debug!("Error closing slower host '{}': {}", hosts[loser], e);
        }
    }

    tracing::debug!(
        "[ACK] Host '{}' selected with latency {:.2}ms",
        hosts[index],
        latency.as_secs_f64() * 1000.0
    );

    Ok(Selection {
        stream,
        host: hosts[index].clone(),
        index,
        latency,
    })
}
