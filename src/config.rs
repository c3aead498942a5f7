use crate::handshake::HANDSHAKE_TIMEOUT;
use crate::pool::DEFAULT_MAX_IDLE;
use crate::protocol::HANDSHAKE_BUFFER_SIZE;
use std::time::Duration;

/// DEFAULT_LISTEN_ADDR is where the relay listens unless told otherwise
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// ServerConfig holds the tunables of a Socks5Server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Upper bound on the greeting + request exchange
    pub handshake_timeout: Duration,

    /// Idle handshake buffers kept for reuse
    pub max_idle_buffers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
            max_idle_buffers: DEFAULT_MAX_IDLE,
        }
    }
}

/// ServerConfig implementation block
impl ServerConfig {
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_max_idle_buffers(mut self, max_idle: usize) -> Self {
        self.max_idle_buffers = max_idle;
        self
    }

    /// buffer_size is fixed, every request fits in it
    pub fn buffer_size(&self) -> usize {
        HANDSHAKE_BUFFER_SIZE
    }
}
