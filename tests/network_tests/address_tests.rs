//! Tests for node addresses and PEER list handling

use std::net::SocketAddr;

use carbondb::network::{join_peer_list, split_peer_list, HostAddr};
use carbondb::CarbonError;

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_parse_host_only_uses_default_port() {
    let addr = HostAddr::parse("db.local").unwrap();

    assert_eq!(addr.host(), "db.local");
    assert_eq!(addr.port(), 13051);
}

#[test]
fn test_parse_host_and_port() {
    let addr: HostAddr = "10.0.0.7:4000".parse().unwrap();

    assert_eq!(addr.host(), "10.0.0.7");
    assert_eq!(addr.port(), 4000);
    assert_eq!(addr.to_string(), "10.0.0.7:4000");
}

#[test]
fn test_parse_ipv6() {
    let bracketed = HostAddr::parse("[::1]:9000").unwrap();
    assert_eq!(bracketed.host(), "::1");
    assert_eq!(bracketed.port(), 9000);
    assert_eq!(bracketed.to_string(), "[::1]:9000");

    let bare = HostAddr::parse("fe80::1").unwrap();
    assert_eq!(bare.host(), "fe80::1");
    assert_eq!(bare.port(), 13051);

    let no_port = HostAddr::parse("[::1]").unwrap();
    assert_eq!(no_port.port(), 13051);
}

#[test]
fn test_parse_trims_whitespace() {
    let addr = HostAddr::parse("  localhost:1234 ").unwrap();
    assert_eq!(addr, HostAddr::new("localhost", 1234));
}

#[test]
fn test_parse_invalid() {
    for input in ["", "   ", ":80", "host:", "host:notaport", "host:70000", "[]:80", "[::1", "[::1]80"] {
        assert!(
            matches!(HostAddr::parse(input), Err(CarbonError::InvalidAddress(_))),
            "{:?} should be rejected",
            input
        );
    }
}

#[test]
fn test_from_socket_addr() {
    let socket: SocketAddr = "127.0.0.1:5555".parse().unwrap();
    let addr = HostAddr::from(socket);

    assert_eq!(addr, HostAddr::new("127.0.0.1", 5555));
    assert_eq!(addr.resolve().unwrap(), vec![socket]);
}

// =============================================================================
// PEER Lists
// =============================================================================

#[test]
fn test_split_peer_list() {
    let hosts: Vec<&str> = split_peer_list("a:1/b:2/c").collect();
    assert_eq!(hosts, vec!["a:1", "b:2", "c"]);
}

#[test]
fn test_split_peer_list_strips_json_quotes() {
    let hosts: Vec<&str> = split_peer_list("\"10.0.0.1:13051/10.0.0.2:13051\"").collect();
    assert_eq!(hosts, vec!["10.0.0.1:13051", "10.0.0.2:13051"]);
}

#[test]
fn test_split_peer_list_skips_empty_segments() {
    let hosts: Vec<&str> = split_peer_list("/a:1// b:2 /").collect();
    assert_eq!(hosts, vec!["a:1", "b:2"]);

    assert_eq!(split_peer_list("").count(), 0);
    assert_eq!(split_peer_list("\"\"").count(), 0);
}

#[test]
fn test_join_peer_list() {
    let hosts = vec![
        HostAddr::new("a", 1),
        HostAddr::new("::1", 2),
        HostAddr::new("c", 13051),
    ];

    let joined = join_peer_list(&hosts);
    assert_eq!(joined, "a:1/[::1]:2/c:13051");

    let parsed: Vec<HostAddr> = split_peer_list(&joined)
        .map(|s| HostAddr::parse(s).unwrap())
        .collect();
    assert_eq!(parsed, hosts);
}
