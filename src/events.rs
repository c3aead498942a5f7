//! Structured connection events.
//!
//! The handshake, relay and server report what happens to a connection
//! through an [`EventSink`]. [`TracingSink`] forwards to `tracing`;
//! [`MemorySink`] keeps events around so tests can look at them.

use crate::address::TargetAddr;
use std::net::SocketAddr;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Direction names one half of a relayed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client side towards the destination
    AToB,
    /// Destination back towards the client
    BToA,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Listening {
        addr: SocketAddr,
    },
    Accepted {
        peer: SocketAddr,
    },
    AcceptFailed {
        error: String,
    },
    Negotiated {
        target: TargetAddr,
    },
    HandshakeFailed {
        error: String,
    },
    DialFailed {
        target: TargetAddr,
        error: String,
    },
    DirectionClosed {
        direction: Direction,
        bytes: u64,
        error: Option<String>,
    },
    Closed {
        a_to_b: u64,
        b_to_a: u64,
    },
}

/// EventSink receives connection events. Implementations must be cheap,
/// they are called inline on the connection task
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// TracingSink writes events as log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: Event) {
        match event {
            Event::Listening { addr } => info!("SOCKS5 relay listening on {addr}"),
            Event::Accepted { peer } => info!("new client: {peer}"),
            Event::AcceptFailed { error } => error!("accept failed: {error}"),
            Event::Negotiated { target } => info!("target: {target}"),
            Event::HandshakeFailed { error } => error!("handshake failed: {error}"),
            Event::DialFailed { target, error } => {
                error!("failed connecting to target {target}: {error}")
            }
            Event::DirectionClosed {
                direction,
                bytes,
                error: Some(error),
            } => warn!("{direction:?} copy ended after {bytes} bytes: {error}"),
            Event::DirectionClosed {
                direction, bytes, ..
            } => debug!("{direction:?} copy finished: {bytes} bytes"),
            Event::Closed { a_to_b, b_to_a } => info!(
                "connection closed: {a_to_b} bytes from client, {b_to_a} bytes from target"
            ),
        }
    }
}

/// MemorySink stores every event it receives
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// events returns a snapshot of what has been recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record(Event::Accepted {
            peer: "127.0.0.1:5000".parse().unwrap(),
        });
        sink.record(Event::Closed { a_to_b: 3, b_to_a: 4 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::Accepted { .. }));
        assert_eq!(events[1], Event::Closed { a_to_b: 3, b_to_a: 4 });
    }
}
