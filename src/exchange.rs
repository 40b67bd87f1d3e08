//! Sending a DNS message to a resolver and waiting for its reply.

use async_trait::async_trait;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::Message;
use trust_dns_proto::serialize::binary::BinEncodable;

/// Largest DNS message a UDP datagram or a TCP length prefix can carry.
const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// One query/reply round trip with a resolver.
///
/// `address` is a `host:port` string. Implementations own their timeout and
/// retry policy; callers surface whatever error comes back.
#[async_trait]
pub trait Exchanger: Send + Sync + 'static {
    async fn exchange(
        &self,
        query: &Message,
        address: &str,
    ) -> Result<(Message, Duration), ExchangeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply from {address} within {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("{0} did not resolve to a socket address")]
    NoAddress(String),

    #[error("DNS codec error: {0}")]
    Proto(#[from] ProtoError),

    #[error("reply id {received} does not match query id {expected}")]
    IdMismatch { expected: u16, received: u16 },

    #[error("message of {0} bytes is too large")]
    MessageTooLarge(usize),
}

/// Network used by [`DnsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "UDP"),
            Transport::Tcp => write!(f, "TCP"),
        }
    }
}

/// Plain DNS client: one query, one reply, no retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsClient {
    net: Transport,
    timeout: Duration,
}

impl Default for DnsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsClient {
    /// UDP client with a 2 second timeout.
    pub fn new() -> Self {
        Self {
            net: Transport::Udp,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_transport(mut self, net: Transport) -> Self {
        self.net = net;
        self
    }

    /// Bound on the whole exchange: address lookup, send and receive.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> Transport {
        self.net
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn round_trip(&self, wire: &[u8], address: &str) -> Result<Vec<u8>, ExchangeError> {
        let server = tokio::net::lookup_host(address)
            .await?
            .next()
            .ok_or_else(|| ExchangeError::NoAddress(address.to_string()))?;

        match self.net {
            Transport::Udp => Self::round_trip_udp(wire, server).await,
            Transport::Tcp => Self::round_trip_tcp(wire, server).await,
        }
    }

    async fn round_trip_udp(wire: &[u8], server: SocketAddr) -> Result<Vec<u8>, ExchangeError> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server).await?;
        socket.send(wire).await?;

        let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }

    async fn round_trip_tcp(wire: &[u8], server: SocketAddr) -> Result<Vec<u8>, ExchangeError> {
        let len = u16::try_from(wire.len()).map_err(|_| ExchangeError::MessageTooLarge(wire.len()))?;

        let mut stream = TcpStream::connect(server).await?;

        let mut framed = Vec::with_capacity(wire.len() + 2);
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(wire);
        stream.write_all(&framed).await?;
        stream.flush().await?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let reply_len = u16::from_be_bytes(len_buf) as usize;

        let mut reply = vec![0u8; reply_len];
        stream.read_exact(&mut reply).await?;
        Ok(reply)
    }
}

#[async_trait]
impl Exchanger for DnsClient {
    async fn exchange(
        &self,
        query: &Message,
        address: &str,
    ) -> Result<(Message, Duration), ExchangeError> {
        let wire = query.to_bytes()?;
        let start = Instant::now();

        let reply = tokio::time::timeout(self.timeout, self.round_trip(&wire, address))
            .await
            .map_err(|_| ExchangeError::Timeout {
                address: address.to_string(),
                timeout: self.timeout,
            })??;

        let rtt = start.elapsed();
        let reply = Message::from_vec(&reply)?;

        if reply.id() != query.id() {
            return Err(ExchangeError::IdMismatch {
                expected: query.id(),
                received: reply.id(),
            });
        }

        debug!(
            server = %address,
            net = %self.net,
            rtt = ?rtt,
            "exchange complete"
        );

        Ok((reply, rtt))
    }
}
