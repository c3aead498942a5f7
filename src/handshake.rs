use crate::address::{Host, TargetAddr};
use crate::error::{HandshakeError, Result};
use crate::events::{Event, EventSink, TracingSink};
use crate::pool::BufferPool;
use crate::protocol::{
    AddressType, AuthMethod, Command, HANDSHAKE_BUFFER_SIZE, MIN_REQUEST_LEN, ReplyCode, Version,
    reply,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

/// HANDSHAKE_TIMEOUT bounds the whole greeting + request exchange
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(4);

/// Handshake runs the server side of the SOCKS5 negotiation on an
/// accepted stream and hands the stream back once the client has been
/// told the tunnel is up
#[derive(Clone)]
pub struct Handshake {
    timeout: Duration,
    pool: BufferPool,
    events: Arc<dyn EventSink>,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new(HANDSHAKE_TIMEOUT)
    }
}

/// Handshake implementation block
impl Handshake {
    /// new is a constructor for the Handshake type
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pool: BufferPool::new(HANDSHAKE_BUFFER_SIZE),
            events: Arc::new(TracingSink),
        }
    }

    /// with_pool shares a buffer pool with other handshakes
    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    /// with_events routes handshake events to the given sink
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// negotiate consumes the greeting and the CONNECT request and returns
    /// the stream, now a plain data channel, with the requested destination
    pub async fn negotiate<S>(&self, mut stream: S) -> Result<(S, TargetAddr)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.exchange(&mut stream).await {
            Ok(target) => {
                self.events.record(Event::Negotiated {
                    target: target.clone(),
                });
                Ok((stream, target))
            }
            Err(e) => {
                self.events.record(Event::HandshakeFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn exchange<S>(&self, stream: &mut S) -> Result<TargetAddr>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // The deadline only wraps the reads below; nothing is left on the
        // stream once we return
        let deadline = Instant::now() + self.timeout;

        // Released on every return path
        let mut buf = self.pool.acquire();

        // ClientHello format
        // +----+----------+----------+
        // |VER | NMETHODS | METHODS  |
        // +----+----------+----------+
        // | 1  |    1     | 1 to 255 |
        // +----+----------+----------+
        match read_before(deadline, stream, &mut buf).await {
            Ok(0) => return Err(HandshakeError::protocol("failed to read hello: eof")),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(e.into()),
            Err(e) => {
                return Err(HandshakeError::protocol(format!(
                    "failed to read hello: {e}"
                )));
            }
        }

        if buf[0] != Version::SOCKS5 as u8 {
            return Err(HandshakeError::UnsupportedVersion(buf[0]));
        }

        // Methods offered by the client are not checked, no-auth is always
        // selected
        stream
            .write_all(&[Version::SOCKS5 as u8, AuthMethod::NoAuth as u8])
            .await?;

        // SOCKS5 request format
        // +----+-----+-------+------+----------+----------+
        // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
        // +----+-----+-------+------+----------+----------+
        // | 1  |  1  | X'00' |  1   | Variable |    2     |
        // +----+-----+-------+------+----------+----------+
        let n = match read_before(deadline, stream, &mut buf).await {
            Ok(n) if n >= MIN_REQUEST_LEN => n,
            Ok(n) => return Err(HandshakeError::ShortRead { got: n, source: None }),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(e.into()),
            Err(e) => {
                return Err(HandshakeError::ShortRead {
                    got: 0,
                    source: Some(e),
                });
            }
        };

        let target = match parse_request(&buf[..n]) {
            Ok(target) => target,
            Err(e) => {
                reject(stream, &e).await;
                return Err(e);
            }
        };

        // Success is reported before the destination has been dialed
        stream.write_all(&reply(ReplyCode::Succeeded)).await?;

        Ok(target)
    }
}

/// parse_request decodes a CONNECT request held in `req`
pub fn parse_request(req: &[u8]) -> Result<TargetAddr> {
    if req.len() < MIN_REQUEST_LEN {
        return Err(HandshakeError::ShortRead {
            got: req.len(),
            source: None,
        });
    }

    // Version and RSV bytes are not checked
    match Command::from_byte(req[1]) {
        Some(Command::Connect) => {}
        _ => return Err(HandshakeError::UnsupportedCommand(req[1])),
    }

    let addr_type =
        AddressType::from_byte(req[3]).ok_or(HandshakeError::UnknownAddressType(req[3]))?;

    // Length of DST.ADDR and where it starts
    let (len, off) = match addr_type {
        AddressType::IPv4 => (4, 4),
        AddressType::IPv6 => (16, 4),
        AddressType::DomainName => (req[4] as usize, 5),
    };

    let available = req.len() - off;
    if available < len + 2 {
        return Err(HandshakeError::ShortRequest {
            needed: len + 2,
            got: available,
        });
    }

    let addr = &req[off..off + len];
    let host = match addr_type {
        AddressType::IPv4 => {
            let octets: [u8; 4] = addr
                .try_into()
                .map_err(|_| HandshakeError::protocol("invalid IPv4 bytes"))?;
            Host::Ip(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        AddressType::IPv6 => {
            let octets: [u8; 16] = addr
                .try_into()
                .map_err(|_| HandshakeError::protocol("invalid IPv6 bytes"))?;
            Host::Ip(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        AddressType::DomainName => {
            // Undecodable bytes become U+FFFD; resolution fails at dial time
            Host::Name(String::from_utf8_lossy(addr).into_owned())
        }
    };

    let port = u16::from_be_bytes([req[off + len], req[off + len + 1]]);

    Ok(TargetAddr { host, port })
}

/// read_before performs a single read that fails with TimedOut once
/// `deadline` has passed
async fn read_before<S>(deadline: Instant, stream: &mut S, buf: &mut [u8]) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    match timeout_at(deadline, stream.read(buf)).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "handshake timed out",
        )),
    }
}

/// reject tells the client why its request was refused, where RFC 1928
/// has a reply code for it. Write failures are ignored, the handshake is
/// failing anyway
async fn reject<S>(stream: &mut S, err: &HandshakeError)
where
    S: AsyncWrite + Unpin,
{
    let code = match err {
        HandshakeError::UnsupportedCommand(_) => ReplyCode::CommandNotSupported,
        HandshakeError::UnknownAddressType(_) => ReplyCode::AddrTypeUnsupported,
        _ => return,
    };

    if let Err(e) = stream.write_all(&reply(code)).await {
        debug!("failed to send {code:?} reply: {e}");
    }
}
