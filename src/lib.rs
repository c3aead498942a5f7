//! A transparent TCP relay speaking the SOCKS5 handshake
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT (BIND and UDP ASSOCIATE are refused)
//!     - No Authentication, always selected
//!     - IPv4, IPv6 and domain name destinations
//!     - Handshake bounded by a deadline that never reaches the relay phase
//!     - Pooled handshake buffers
//!     - Both relay directions joined before a connection counts as closed
//!     - Connection events through a pluggable sink
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//!
//! # Example
//! ```no_run
//! use socksrelay::Socks5Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Socks5Server::new("127.0.0.1:1080");
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod events;
pub mod handshake;
pub mod pool;
pub mod protocol;
pub mod relay;
pub mod server;

// Re-export main types at crate root for convenience
pub use address::{Host, TargetAddr};
pub use config::ServerConfig;
pub use error::HandshakeError;
pub use events::{Event, EventSink, MemorySink, TracingSink};
pub use handshake::Handshake;
pub use relay::{Connect, RelayStats, relay};
pub use server::Socks5Server;
