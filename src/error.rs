//! Handshake error taxonomy.

use std::io;
use thiserror::Error;

/// Errors that end a SOCKS5 handshake. Every variant is scoped to the
/// connection it happened on.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Greeting could not be read, or the request carried undecodable data
    #[error("protocol error: {0}")]
    Protocol(String),

    /// First greeting byte was not 0x05
    #[error("unsupported socks version {0:#04x}")]
    UnsupportedVersion(u8),

    /// Anything but CONNECT
    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("unknown address type {0:#04x}")]
    UnknownAddressType(u8),

    /// Request read failed or returned fewer than 7 bytes
    #[error("short read on request: got {got} bytes")]
    ShortRead {
        got: usize,
        #[source]
        source: Option<io::Error>,
    },

    /// Request ended before the address and port it announced
    #[error("short command request: need {needed} bytes, got {got}")]
    ShortRequest { needed: usize, got: usize },

    /// Transport failure, including the handshake deadline expiring
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl HandshakeError {
    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        HandshakeError::Protocol(msg.into())
    }

    /// is_timeout reports whether the handshake deadline expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, HandshakeError::Io(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
