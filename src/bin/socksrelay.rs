use anyhow::{Result, bail};
use clap::Parser;
use socksrelay::{ServerConfig, Socks5Server, config::DEFAULT_LISTEN_ADDR};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "A transparent TCP relay speaking SOCKS5", long_about = None)]
struct Args {
    /// Listener address
    #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Seconds a client gets to complete the SOCKS5 handshake
    #[arg(short = 't', long, default_value_t = 4)]
    handshake_timeout: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    if args.handshake_timeout == 0 {
        bail!("[ERR] handshake timeout must be at least one second");
    }

    let config =
        ServerConfig::default().with_handshake_timeout(Duration::from_secs(args.handshake_timeout));

    // Instantiate server
    let mut server = Socks5Server::new(args.listen).with_config(config);

    // Run it
    info!("Starting SOCKS5 relay: {}", server.listen_addr);
    server.run().await
}
