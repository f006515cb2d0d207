//! Tests for session-scoped replication
//!
//! These tests verify:
//! - WRIT and WIPE fan out to every peer of the session
//! - Peers only see mutations from the session that registered them
//! - Peer links close with their session
//! - A dead peer never fails the client's writes
//! - A peer that stops reading never stalls the session

#[path = "../common/mod.rs"]
mod common;

use std::time::{Duration, Instant};

use carbondb::protocol::{Status, TransactionType};
use carbondb::{Client, Config};
use common::{wait_until, FakeBehavior, FakeNode, TestNode};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_fan_out_to_all_peers() {
    let node = TestNode::start();
    let first = FakeNode::helo();
    let second = FakeNode::helo();
    let mut conn = node.connect();

    let list = format!("{}/{}", first.host(), second.host());
    assert_eq!(conn.send(TransactionType::Peer, "LIST", list.as_bytes()).status, Status::Opok);

    assert_eq!(conn.send(TransactionType::Writ, "a", b"1").status, Status::Opok);
    assert_eq!(conn.send(TransactionType::Wipe, "a", b"").status, Status::Opok);
    assert_eq!(conn.send(TransactionType::Read, "a", b"").payload, b"null");

    for fake in [&first, &second] {
        assert!(wait_until(WAIT, || fake.received().len() == 3));
        let received = fake.received();

        assert_eq!(received[0].type_code, TransactionType::Ping as u8);
        assert_eq!(received[1].type_code, TransactionType::Writ as u8);
        assert_eq!(received[1].key, b"a");
        assert_eq!(received[1].value, b"1");
        assert_eq!(received[2].type_code, TransactionType::Wipe as u8);
        assert_eq!(received[2].key, b"a");
        assert!(received[2].value.is_empty());
    }

    // Reads, pings and peer lists are never forwarded
    assert!(first.received_of(TransactionType::Read).is_empty());
    assert!(first.received_of(TransactionType::Peer).is_empty());
}

#[test]
fn test_replication_is_session_scoped() {
    let node = TestNode::start();
    let fake = FakeNode::helo();

    let mut owner = node.connect();
    let mut other = node.connect();
    owner.send(TransactionType::Peer, "LIST", fake.host().as_bytes());

    assert_eq!(other.send(TransactionType::Writ, "from-other", b"1").status, Status::Opok);
    assert_eq!(owner.send(TransactionType::Writ, "from-owner", b"2").status, Status::Opok);

    assert!(wait_until(WAIT, || fake.received_of(TransactionType::Writ).len() == 1));
    let writes = fake.received_of(TransactionType::Writ);
    assert_eq!(writes[0].key, b"from-owner");

    // Both writes are local either way
    assert_eq!(node.stored("from-other"), Some(b"1".to_vec()));
    assert_eq!(node.stored("from-owner"), Some(b"2".to_vec()));
}

#[test]
fn test_peer_links_close_with_session() {
    let node = TestNode::start();
    let first = FakeNode::helo();
    let second = FakeNode::helo();
    let mut conn = node.connect();

    let list = format!("{}/{}", first.host(), second.host());
    conn.send(TransactionType::Peer, "LIST", list.as_bytes());
    conn.send(TransactionType::Writ, "k", b"v");
    assert_eq!(first.closed(), 0);

    conn.close();

    assert!(wait_until(WAIT, || first.closed() == 1 && second.closed() == 1));
    // Queued frames are flushed before the link goes away
    assert_eq!(first.received_of(TransactionType::Writ).len(), 1);
    assert_eq!(second.received_of(TransactionType::Writ).len(), 1);
}

#[test]
fn test_hung_up_peer_does_not_fail_writes() {
    let node = TestNode::start();
    let flaky = FakeNode::spawn(FakeBehavior {
        close_after_handshake: true,
        ..FakeBehavior::default()
    });
    let steady = FakeNode::helo();
    let mut conn = node.connect();

    let list = format!("{}/{}", flaky.host(), steady.host());
    conn.send(TransactionType::Peer, "LIST", list.as_bytes());
    assert!(wait_until(WAIT, || flaky.closed() == 1));

    for i in 0..20 {
        let response = conn.send(TransactionType::Writ, &format!("k{}", i), b"1");
        assert_eq!(response.status, Status::Opok);
    }

    assert_eq!(node.store.len(), 20);
    assert!(wait_until(WAIT, || steady.received_of(TransactionType::Writ).len() == 20));
}

#[test]
fn test_stalled_peer_does_not_block_writes() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .peer_timeout_ms(1000)
        .peer_queue_depth(4)
        .build();
    let node = TestNode::start_with(config);
    let stalled = FakeNode::stalled(Duration::from_secs(10));
    let mut conn = node.connect();

    let response = conn.send(TransactionType::Peer, "LIST", stalled.host().as_bytes());
    assert_eq!(response.status, Status::Opok);
    assert_eq!(stalled.accepted(), 1);

    let value = vec![b'x'; 1024 * 1024];
    let started = Instant::now();
    for i in 0..100 {
        let sent = Instant::now();
        let response = conn.send(TransactionType::Writ, &format!("big{}", i), &value);
        assert_eq!(response.status, Status::Opok);
        assert!(sent.elapsed() < Duration::from_secs(1), "write {} waited on the peer", i);
    }
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(conn.send(TransactionType::Ping, "TIME", b"").status, Status::Helo);
    assert_eq!(node.store.len(), 100);

    let closing = Instant::now();
    conn.close();
    assert!(wait_until(WAIT, || node.active_sessions() == 0));
    assert!(closing.elapsed() < WAIT);
}

#[test]
fn test_peer_queue_is_bounded_by_bytes() {
    // Plenty of frames allowed and a long write timeout: only the byte limit can drop the peer
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .peer_timeout_ms(30_000)
        .peer_queue_bytes(1024 * 1024)
        .build();
    let node = TestNode::start_with(config);
    let stalled = FakeNode::stalled(Duration::from_millis(1500));
    let mut conn = node.connect();

    conn.send(TransactionType::Peer, "LIST", stalled.host().as_bytes());

    let value = vec![b'y'; 256 * 1024];
    for i in 0..200 {
        let response = conn.send(TransactionType::Writ, &format!("k{}", i), &value);
        assert_eq!(response.status, Status::Opok);
    }

    // The link is gone while its session lives on
    assert!(wait_until(Duration::from_secs(10), || stalled.closed() == 1));
    assert_eq!(node.active_sessions(), 1);
    assert!(stalled.received_of(TransactionType::Writ).len() < 200);

    assert_eq!(conn.send(TransactionType::Ping, "TIME", b"").status, Status::Helo);
}

#[test]
fn test_client_replicates_across_nodes() {
    let nodes = [TestNode::start(), TestNode::start(), TestNode::start()];
    let hosts: Vec<String> = nodes.iter().map(TestNode::host).collect();

    let mut client = Client::connect(&hosts).unwrap();
    client.write("shared", &42).unwrap();
    client.write("gone", "soon").unwrap();
    client.delete("gone").unwrap();

    for node in &nodes {
        assert!(wait_until(WAIT, || node.stored("shared") == Some(b"42".to_vec())));
        assert!(wait_until(WAIT, || node.stored("gone").is_none()));
    }
    assert_eq!(client.read::<i64>("shared").unwrap(), Some(42));
}
