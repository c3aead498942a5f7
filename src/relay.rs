use crate::events::{Direction, Event, EventSink};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// RELAY_BUFFER_SIZE is the per-direction copy buffer
const RELAY_BUFFER_SIZE: usize = 32 * 1024;

/// RelayStats reports how much each direction carried, along with the
/// first I/O error either direction ended on
#[derive(Debug, Default)]
pub struct RelayStats {
    pub a_to_b: u64,
    pub b_to_a: u64,
    pub error: Option<io::Error>,
}

/// Connect holds the two ends of a CONNECT tunnel
pub struct Connect<A, B> {
    pub inbound: A,
    pub outbound: B,
}

/// Connect implementation block
impl<A, B> Connect<A, B>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    /// run relays between client and destination until both sides are done
    pub async fn run(self, events: &dyn EventSink) -> RelayStats {
        relay(self.inbound, self.outbound, events).await
    }
}

/// relay copies a -> b on a spawned task and b -> a on the calling task.
/// A direction that hits EOF or an error shuts down the write side it was
/// feeding and stops; the other direction keeps going. Returns once both
/// directions have finished
pub async fn relay<A, B>(a: A, b: B, events: &dyn EventSink) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let forward = tokio::spawn(copy_half(a_read, b_write));

    let (b_to_a, back_err) = copy_half(b_read, a_write).await;
    events.record(Event::DirectionClosed {
        direction: Direction::BToA,
        bytes: b_to_a,
        error: back_err.as_ref().map(ToString::to_string),
    });

    let (a_to_b, forward_err) = match forward.await {
        Ok(res) => res,
        Err(e) => (0, Some(io::Error::other(e))),
    };
    events.record(Event::DirectionClosed {
        direction: Direction::AToB,
        bytes: a_to_b,
        error: forward_err.as_ref().map(ToString::to_string),
    });

    events.record(Event::Closed { a_to_b, b_to_a });

    RelayStats {
        a_to_b,
        b_to_a,
        error: forward_err.or(back_err),
    }
}

/// copy_half moves bytes from reader to writer until EOF or an error,
/// then shuts the writer down
async fn copy_half<R, W>(mut reader: R, mut writer: W) -> (u64, Option<io::Error>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut copied = 0u64;

    let err = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break None,
            Ok(n) => n,
            Err(e) => break Some(e),
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            break Some(e);
        }
        copied += n as u64;
    };

    // Peer may already be gone
    let _ = writer.shutdown().await;

    (copied, err)
}
