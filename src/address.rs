use crate::protocol::{AddressType, Command, RSV, Version};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;

/// Host is the destination host of a CONNECT request: either a domain
/// name to be resolved at dial time or a raw IP address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Name(String),
    Ip(IpAddr),
}

/// TargetAddr is the destination parsed out of a CONNECT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    pub host: Host,
    pub port: u16,
}

/// TargetAddr implementation block
impl TargetAddr {
    /// name builds a TargetAddr for a domain name
    pub fn name(name: impl Into<String>, port: u16) -> Self {
        Self {
            host: Host::Name(name.into()),
            port,
        }
    }

    /// ip builds a TargetAddr for a raw IP address
    pub fn ip(ip: impl Into<IpAddr>, port: u16) -> Self {
        Self {
            host: Host::Ip(ip.into()),
            port,
        }
    }

    /// address_type returns the wire ATYP this address is encoded with
    pub fn address_type(&self) -> AddressType {
        match self.host {
            Host::Name(_) => AddressType::DomainName,
            Host::Ip(IpAddr::V4(_)) => AddressType::IPv4,
            Host::Ip(IpAddr::V6(_)) => AddressType::IPv6,
        }
    }

    /// connect dials the destination, resolving names through the system
    /// resolver
    pub async fn connect(&self) -> std::io::Result<TcpStream> {
        match &self.host {
            Host::Name(name) => TcpStream::connect((name.as_str(), self.port)).await,
            Host::Ip(ip) => TcpStream::connect(SocketAddr::new(*ip, self.port)).await,
        }
    }

    /// encode_request renders a CONNECT request for this address.
    /// Domain names longer than 255 bytes are truncated
    pub fn encode_request(&self) -> Vec<u8> {
        let mut req = vec![
            Version::SOCKS5 as u8,
            Command::Connect as u8,
            RSV,
            self.address_type() as u8,
        ];

        match &self.host {
            Host::Ip(IpAddr::V4(ip)) => req.extend_from_slice(&ip.octets()),
            Host::Ip(IpAddr::V6(ip)) => req.extend_from_slice(&ip.octets()),
            Host::Name(name) => {
                let bytes = &name.as_bytes()[..name.len().min(u8::MAX as usize)];
                req.push(bytes.len() as u8);
                req.extend_from_slice(bytes);
            }
        }

        req.extend_from_slice(&self.port.to_be_bytes());
        req
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Name(name) => write!(f, "{name}:{}", self.port),
            Host::Ip(ip) => write!(f, "{}", SocketAddr::new(*ip, self.port)),
        }
    }
}
