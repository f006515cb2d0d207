//! Tests for the client transaction driver

#[path = "../common/mod.rs"]
mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use carbondb::protocol::{Status, TransactionType, AUTH_UNSUPPORTED_MESSAGE};
use carbondb::{CarbonError, Client, ClientConfig};
use common::TestNode;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    id: u32,
    owner: String,
    tags: Vec<String>,
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_write_read_typed_value() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    let account = Account {
        id: 7,
        owner: "ada".to_string(),
        tags: vec!["admin".to_string()],
    };
    client.write("account:7", &account).unwrap();

    assert_eq!(client.read::<Account>("account:7").unwrap(), Some(account));
    assert_eq!(
        node.stored("account:7").unwrap(),
        br#"{"id":7,"owner":"ada","tags":["admin"]}"#.to_vec()
    );
}

#[test]
fn test_read_missing_key() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    assert_eq!(client.read::<String>("missing").unwrap(), None);
}

#[test]
fn test_delete() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    client.write("k", "v").unwrap();
    client.delete("k").unwrap();

    assert_eq!(client.read::<String>("k").unwrap(), None);
    assert_eq!(node.stored("k"), None);
}

#[test]
fn test_read_with_wrong_type_is_json_error() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    client.write("n", "not a number").unwrap();
    assert!(matches!(client.read::<u64>("n"), Err(CarbonError::Json(_))));

    // The connection survives a decode error
    assert!(client.is_connected());
    assert_eq!(client.read::<String>("n").unwrap().as_deref(), Some("not a number"));
}

#[test]
fn test_auth_is_rejected() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    match client.auth("hunter2") {
        Err(CarbonError::Rejected(message)) => assert_eq!(message, AUTH_UNSUPPORTED_MESSAGE),
        other => panic!("Expected Rejected, got {:?}", other),
    }
    assert!(client.is_connected());
}

#[test]
fn test_ping() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    let elapsed = client.ping().unwrap();
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn test_raw_transact() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    let response = client
        .transact(TransactionType::Writ, "raw", Some(b"[1,2,3]".as_slice()))
        .unwrap();
    assert_eq!(response.status, Status::Opok);

    let response = client.transact(TransactionType::Read, "raw", None).unwrap();
    assert_eq!(response.payload, b"[1,2,3]");
}

// =============================================================================
// Connection Management
// =============================================================================

#[test]
fn test_disconnect_then_reselect() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();
    client.write("k", &1).unwrap();

    client.disconnect();
    assert!(!client.is_connected());
    assert!(client.active_host().is_none());
    assert!(matches!(client.read::<i32>("k"), Err(CarbonError::NoAvailableNodes)));

    client.reselect().unwrap();
    assert_eq!(client.read::<i32>("k").unwrap(), Some(1));
}

#[test]
fn test_server_gone_drops_connection() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();
    drop(node);

    // Nothing listens any more
    assert!(matches!(client.reselect(), Err(CarbonError::NoAvailableNodes)));
    assert!(!client.is_connected());
}

#[test]
fn test_oversized_response_drops_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let host = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut ping = [0u8; 34];
        stream.read_exact(&mut ping).unwrap();
        stream.write_all(&[0, 0, 0, 0, 0]).unwrap();

        // Answer the READ with a header declaring far more than allowed
        let mut read = [0u8; 31];
        stream.read_exact(&mut read).unwrap();
        let mut reply = vec![1u8];
        reply.extend_from_slice(&u32::MAX.to_be_bytes());
        stream.write_all(&reply).unwrap();
        thread::sleep(Duration::from_secs(3));
    });

    let config = ClientConfig {
        max_response_size: 1024,
        ..ClientConfig::default()
    };
    let mut client = Client::with_config([host], config).unwrap();

    assert!(matches!(
        client.read::<String>("k"),
        Err(CarbonError::ValueTooLarge { max: 1024, .. })
    ));
    assert!(!client.is_connected());
}

#[test]
fn test_no_hosts_available() {
    let closed = common::closed_addr();
    assert!(matches!(
        Client::connect([closed]),
        Err(CarbonError::NoAvailableNodes)
    ));
}

#[test]
fn test_invalid_host() {
    assert!(matches!(
        Client::connect(["host:notaport"]),
        Err(CarbonError::InvalidAddress(_))
    ));
}

#[test]
fn test_client_config() {
    let node = TestNode::start();
    let config = ClientConfig {
        connect_timeout_ms: 500,
        io_timeout_ms: 0,
        ..ClientConfig::default()
    };
    assert_eq!(config.io_timeout(), None);

    let mut client = Client::with_config([node.host()], config).unwrap();
    client.write("k", &true).unwrap();
    assert_eq!(client.read::<bool>("k").unwrap(), Some(true));
}

// =============================================================================
// Sandbox
// =============================================================================

#[test]
fn test_sandbox_round_trip() {
    let node = TestNode::start();
    let mut client = Client::connect([node.host()]).unwrap();

    let mut sandbox = client.sandbox("settings").unwrap();
    assert_eq!(sandbox.name(), "settings");
    assert!(sandbox.values().is_empty());

    sandbox.set("theme", "dark").unwrap();
    sandbox.set("retries", &3).unwrap();
    sandbox.commit(&mut client).unwrap();

    assert_eq!(
        client.read::<serde_json::Value>("settings").unwrap(),
        Some(json!({"theme": "dark", "retries": 3}))
    );

    let mut reloaded = client.sandbox("settings").unwrap();
    assert_eq!(reloaded.get("theme"), Some(&json!("dark")));
    assert_eq!(reloaded.get_as::<u32>("retries").unwrap(), Some(3));
    assert_eq!(reloaded.remove("theme"), Some(json!("dark")));
    reloaded.commit(&mut client).unwrap();

    let last = client.sandbox("settings").unwrap();
    assert_eq!(last.get("theme"), None);
    assert_eq!(last.values().len(), 1);
}
