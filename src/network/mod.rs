//! Network Module
//!
//! TCP server, per-connection sessions and peer replication links.
//!
//! ## Architecture
//! - Single acceptor thread
//! - One thread per session
//! - Each session owns the peer links it opened (writer + drain thread each)

mod address;
mod peer;
mod server;
mod session;

pub use address::{join_peer_list, split_peer_list, HostAddr};
pub use peer::{connect_peer, handshake, PeerLink, PEER_REPLY_LIMIT};
pub use server::Server;
pub use session::Session;
