//! # CarbonDB
//!
//! A minimal distributed key-value store with:
//! - A fixed-header binary TCP protocol (PING/WRIT/READ/WIPE/AUTH/PEER)
//! - Durable log-structured storage with torn-write recovery
//! - Session-scoped, best-effort replication to peers named by the client
//! - A client that races candidate hosts and keeps the fastest
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │        (host selection → one active connection)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ transactions
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  TCP Server / Session                        │
//! │            (one thread per connection)                       │
//! └─────────────────────┬───────────────────┬───────────────────┘
//!                       │                   │ WRIT / WIPE
//!                       ▼                   ▼
//!               ┌─────────────┐     ┌─────────────┐
//!               │   Storage   │     │ Peer links  │──► other nodes
//!               │ (LogStore)  │     │ (per session)│
//!               └─────────────┘     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod storage;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CarbonError, Result};
pub use config::{ClientConfig, Config};
pub use client::{Client, Sandbox};
pub use network::{HostAddr, Server};
pub use storage::{LogStore, MemoryStore, Storage};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CarbonDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
