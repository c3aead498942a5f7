//! End-to-end tests: a real Socks5Server on loopback relaying to a local
//! echo destination.

use socksrelay::{Event, MemorySink, Socks5Server, TargetAddr};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SUCCESS_REPLY: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Start the relay on an OS-assigned port
async fn start_proxy(events: Arc<MemorySink>) -> SocketAddr {
    let mut server = Socks5Server::new("127.0.0.1:0").with_events(events);
    let addr = server.bind().await.unwrap();
    tokio::spawn(async move { server.run().await });
    addr
}

/// Start a TCP echo server
async fn start_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    addr
}

/// A loopback port with nothing listening on it
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn greet(stream: &mut TcpStream) {
    stream.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    let mut resp = [0u8; 2];
    stream.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, [0x05, 0x00]);
}

async fn connect(stream: &mut TcpStream, target: &TargetAddr) -> [u8; 10] {
    stream.write_all(&target.encode_request()).await.unwrap();
    let mut resp = [0u8; 10];
    stream.read_exact(&mut resp).await.unwrap();
    resp
}

/// Wait until the sink has seen an event matching `pred`
async fn wait_for(sink: &MemorySink, pred: impl Fn(&Event) -> bool) -> bool {
    for _ in 0..100 {
        if sink.events().iter().any(&pred) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn connect_ipv4_relays_bytes() {
    let sink = Arc::new(MemorySink::new());
    let proxy = start_proxy(sink.clone()).await;
    let echo = start_echo().await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    greet(&mut client).await;

    let target = TargetAddr::ip(Ipv4Addr::LOCALHOST, echo.port());
    assert_eq!(connect(&mut client, &target).await, SUCCESS_REPLY);

    client.write_all(b"hello through the relay").await.unwrap();
    let mut buf = [0u8; 23];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello through the relay");

    // Half-close travels to the echo server, which then closes its side
    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    assert!(
        wait_for(&sink, |e| *e
            == Event::Closed {
                a_to_b: 23,
                b_to_a: 23
            })
        .await
    );
    assert!(
        sink.events()
            .contains(&Event::Negotiated { target: target.clone() })
    );
}

#[tokio::test]
async fn connect_by_domain_name() {
    let sink = Arc::new(MemorySink::new());
    let proxy = start_proxy(sink.clone()).await;
    let echo = start_echo().await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    greet(&mut client).await;

    let target = TargetAddr::name("localhost", echo.port());
    assert_eq!(connect(&mut client, &target).await, SUCCESS_REPLY);

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn success_is_replied_before_dial_fails() {
    let sink = Arc::new(MemorySink::new());
    let proxy = start_proxy(sink.clone()).await;
    let port = closed_port().await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    greet(&mut client).await;

    // The reply claims success even though nothing listens there
    let target = TargetAddr::ip(Ipv4Addr::LOCALHOST, port);
    assert_eq!(connect(&mut client, &target).await, SUCCESS_REPLY);

    // ...and the connection is then simply closed
    let mut rest = Vec::new();
    let _ = client.read_to_end(&mut rest).await;
    assert!(rest.is_empty());

    assert!(wait_for(&sink, |e| matches!(e, Event::DialFailed { .. })).await);
}

#[tokio::test]
async fn wrong_version_is_dropped_silently() {
    let sink = Arc::new(MemorySink::new());
    let proxy = start_proxy(sink.clone()).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

    let mut rest = Vec::new();
    let _ = client.read_to_end(&mut rest).await;
    assert!(rest.is_empty());

    assert!(wait_for(&sink, |e| matches!(e, Event::HandshakeFailed { .. })).await);
}

#[tokio::test]
async fn bind_twice_is_an_error() {
    let mut server = Socks5Server::new("127.0.0.1:0");
    server.bind().await.unwrap();
    assert!(server.bind().await.is_err());
}

#[tokio::test]
async fn undecodable_domain_is_replied_then_dial_fails() {
    let sink = Arc::new(MemorySink::new());
    let proxy = start_proxy(sink.clone()).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    greet(&mut client).await;

    client
        .write_all(&[0x05, 0x01, 0x00, 0x03, 0x02, 0xc3, 0x28, 0x00, 0x50])
        .await
        .unwrap();
    let mut resp = [0u8; 10];
    client.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, SUCCESS_REPLY);

    let mut rest = Vec::new();
    let _ = client.read_to_end(&mut rest).await;
    assert!(rest.is_empty());

    assert!(wait_for(&sink, |e| matches!(e, Event::DialFailed { .. })).await);
    assert!(
        !sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::HandshakeFailed { .. }))
    );
}
