use crate::{
    config::ServerConfig,
    events::{Event, EventSink, TracingSink},
    handshake::Handshake,
    pool::BufferPool,
    relay::Connect,
};
use anyhow::{Context, Result, anyhow, bail};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};

/// Socks5Server accepts client connections, runs the handshake on each
/// one, dials the requested destination and relays between the two
pub struct Socks5Server {
    pub listen_addr: String,
    pub config: ServerConfig,
    events: Arc<dyn EventSink>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            config: ServerConfig::default(),
            events: Arc::new(TracingSink),
            listener: None,
        }
    }

    /// with_config replaces the default tunables
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// with_events routes every connection event to the given sink
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// bind to the listen address and return the bound address
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("bind can only be called once");
        }

        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("failed to listen on {}", self.listen_addr))?;
        let addr = listener.local_addr()?;

        self.events.record(Event::Listening { addr });

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run accepts connections forever, one task per client
    pub async fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow!("listener missing after bind"))?;

        // Shared by every handshake
        let handshake = Handshake::new(self.config.handshake_timeout)
            .with_pool(BufferPool::with_max_idle(
                self.config.buffer_size(),
                self.config.max_idle_buffers,
            ))
            .with_events(Arc::clone(&self.events));

        loop {
            let (inbound, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // A failed accept only loses that one client
                    self.events.record(Event::AcceptFailed {
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let handshake = handshake.clone();
            let events = Arc::clone(&self.events);

            tokio::spawn(async move {
                events.record(Event::Accepted { peer: peer_addr });

                handle_connection(inbound, &handshake, events.as_ref()).await;
            });
        }
    }
}

/// handle_connection drives one client from handshake to teardown.
/// Every failure is reported through the sink
async fn handle_connection(inbound: TcpStream, handshake: &Handshake, events: &dyn EventSink) {
    let Ok((inbound, target)) = handshake.negotiate(inbound).await else {
        return;
    };

    // The client has already been told the connect succeeded
    let outbound = match target.connect().await {
        Ok(outbound) => outbound,
        Err(e) => {
            events.record(Event::DialFailed {
                target: target.clone(),
                error: e.to_string(),
            });
            return;
        }
    };

    // outbound is dropped, and so closed, when the relay returns
    let connect = Connect { inbound, outbound };
    connect.run(events).await;
}
