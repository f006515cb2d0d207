//! Tests for host selection
//!
//! These tests verify:
//! - The lowest-latency responsive host wins
//! - Slower hosts are disconnected after the decision
//! - Unreachable and non-HELO hosts are skipped
//! - The winner is told about the other hosts

#[path = "../common/mod.rs"]
mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use carbondb::client::select_host;
use carbondb::protocol::{Status, TransactionType};
use carbondb::{CarbonError, Client, HostAddr};
use common::{closed_addr, wait_until, FakeBehavior, FakeNode};

const TIMEOUT: Duration = Duration::from_secs(2);
const WAIT: Duration = Duration::from_secs(5);

fn addr(host: &str) -> HostAddr {
    HostAddr::parse(host).unwrap()
}

#[test]
fn test_fastest_host_wins() {
    let slow = FakeNode::with_delay(Duration::from_millis(150));
    let fast = FakeNode::with_delay(Duration::from_millis(10));
    let dead = closed_addr();

    let hosts = vec![addr(&slow.host()), addr(&fast.host()), addr(&dead)];
    let selection = select_host(&hosts, TIMEOUT).unwrap();

    assert_eq!(selection.index, 1);
    assert_eq!(selection.host, hosts[1]);
    assert!(selection.latency >= Duration::from_millis(10));
    assert!(selection.latency < Duration::from_millis(150));

    // The slower node is let go, the winner is kept
    assert!(wait_until(WAIT, || slow.closed() == 1));
    assert_eq!(fast.closed(), 0);
    drop(selection);
    assert!(wait_until(WAIT, || fast.closed() == 1));
}

#[test]
fn test_every_host_is_pinged() {
    let nodes: Vec<FakeNode> = (0..4).map(|_| FakeNode::helo()).collect();
    let hosts: Vec<HostAddr> = nodes.iter().map(|n| addr(&n.host())).collect();

    let _selection = select_host(&hosts, TIMEOUT).unwrap();

    for node in &nodes {
        assert_eq!(node.accepted(), 1);
        assert_eq!(node.received_of(TransactionType::Ping).len(), 1);
        assert_eq!(node.received()[0].key, b"TIME");
    }
}

#[test]
fn test_no_responsive_hosts() {
    let hosts = vec![addr(&closed_addr()), addr(&closed_addr())];

    assert!(matches!(
        select_host(&hosts, TIMEOUT),
        Err(CarbonError::NoAvailableNodes)
    ));
}

#[test]
fn test_empty_host_list() {
    assert!(matches!(
        select_host(&[], TIMEOUT),
        Err(CarbonError::NoAvailableNodes)
    ));
}

#[test]
fn test_non_helo_host_is_skipped() {
    let refusing = FakeNode::spawn(FakeBehavior {
        ping_status: Status::Opok,
        ..FakeBehavior::default()
    });
    let slower = FakeNode::with_delay(Duration::from_millis(50));

    let hosts = vec![addr(&refusing.host()), addr(&slower.host())];
    let selection = select_host(&hosts, TIMEOUT).unwrap();

    assert_eq!(selection.index, 1);
}

#[test]
fn test_oversized_handshake_reply_is_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let host = addr(&listener.local_addr().unwrap().to_string());
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut ping = [0u8; 34];
        stream.read_exact(&mut ping).unwrap();
        // HELO declaring a 4 GiB payload that never comes
        let mut reply = vec![0u8];
        reply.extend_from_slice(&u32::MAX.to_be_bytes());
        stream.write_all(&reply).unwrap();
        thread::sleep(Duration::from_secs(3));
    });

    let started = Instant::now();
    assert!(matches!(
        select_host(&[host], TIMEOUT),
        Err(CarbonError::NoAvailableNodes)
    ));
    assert!(started.elapsed() < TIMEOUT);
}

#[test]
fn test_silent_host_times_out() {
    let silent = FakeNode::with_delay(Duration::from_secs(3));
    let hosts = vec![addr(&silent.host())];

    assert!(matches!(
        select_host(&hosts, Duration::from_millis(200)),
        Err(CarbonError::NoAvailableNodes)
    ));
}

// =============================================================================
// Client Selection
// =============================================================================

#[test]
fn test_client_sends_peer_list_to_winner() {
    let slow = FakeNode::with_delay(Duration::from_millis(150));
    let fast = FakeNode::helo();
    let dead = closed_addr();

    let client = Client::connect([slow.host(), fast.host(), dead.clone()]).unwrap();
    assert_eq!(client.active_host(), Some(&addr(&fast.host())));
    assert!(client.latency().is_some());

    let peers = fast.received_of(TransactionType::Peer);
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].key, b"LIST");

    let expected = serde_json::to_vec(&format!("{}/{}", slow.host(), dead)).unwrap();
    assert_eq!(peers[0].value, expected);

    assert!(slow.received_of(TransactionType::Peer).is_empty());
}

#[test]
fn test_single_host_sends_no_peer_list() {
    let only = FakeNode::helo();

    let client = Client::connect([only.host()]).unwrap();
    assert!(client.is_connected());
    assert_eq!(client.hosts().len(), 1);

    assert_eq!(only.received().len(), 1);
    assert!(only.received_of(TransactionType::Peer).is_empty());
}
