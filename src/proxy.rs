use crate::exchange::{DnsClient, ExchangeError, Exchanger};
use crate::resolv_conf::{ResolvConf, ResolvConfError};
use crate::{Backend, BackendError, DEFAULT_PORT, DEFAULT_RESOLV_CONF};
use async_trait::async_trait;
use http::StatusCode;
use std::path::PathBuf;
use tracing::debug;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::Message;
use trust_dns_proto::serialize::binary::BinEncodable;

/// Settings for [`ProxyBackend`]. Anything left unset takes its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Upstream resolver hosts. Empty means "read them from `resolv_conf`".
    pub servers: Vec<String>,
    /// Upstream port, `53` when unset.
    pub port: Option<String>,
    /// Resolver configuration file, `/etc/resolv.conf` when unset.
    pub resolv_conf: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("unable to unpack DNS query: {0}")]
    Unpack(#[source] ProtoError),

    #[error("exchange with {address} failed: {source}")]
    Exchange {
        address: String,
        #[source]
        source: ExchangeError,
    },

    #[error("unable to pack DNS reply: {0}")]
    Pack(#[source] ProtoError),
}

impl ProxyError {
    /// Malformed queries are the client's fault, everything else is ours.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unpack(_) => StatusCode::BAD_REQUEST,
            ProxyError::Exchange { .. } | ProxyError::Pack(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProxyError> for BackendError {
    fn from(err: ProxyError) -> Self {
        BackendError::new(err.status(), err)
    }
}

/// Passes queries on to a recursive resolver.
///
/// Only the first configured server is ever contacted; the rest of the list
/// is kept for reference but never used for failover.
#[derive(Debug)]
pub struct ProxyBackend<E = DnsClient> {
    servers: Vec<String>,
    port: String,
    exchanger: E,
}

impl ProxyBackend<DnsClient> {
    /// Proxy using the default [`DnsClient`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use doh_proxy::{ProxyBackend, ProxyConfig};
    ///
    /// let backend = ProxyBackend::new(ProxyConfig {
    ///     servers: vec!["192.0.2.53".to_string()],
    ///     ..Default::default()
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(backend.port(), "53");
    /// ```
    pub fn new(config: ProxyConfig) -> Result<Self, ResolvConfError> {
        Self::with_exchanger(config, DnsClient::new())
    }
}

impl<E: Exchanger> ProxyBackend<E> {
    /// Proxy using a caller-supplied exchanger.
    pub fn with_exchanger(config: ProxyConfig, exchanger: E) -> Result<Self, ResolvConfError> {
        let resolv_conf = config
            .resolv_conf
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOLV_CONF));

        let servers = if config.servers.is_empty() {
            let servers = ResolvConf::from_file(&resolv_conf)?.servers;
            if servers.is_empty() {
                return Err(ResolvConfError::NoServers { path: resolv_conf });
            }
            servers
        } else {
            config.servers
        };

        let port = config.port.unwrap_or_else(|| DEFAULT_PORT.to_string());

        Ok(Self {
            servers,
            port,
            exchanger,
        })
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn exchanger(&self) -> &E {
        &self.exchanger
    }

    /// Address of the upstream every query goes to.
    pub fn upstream(&self) -> String {
        join_host_port(&self.servers[0], &self.port)
    }

    async fn forward(&self, wire: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let query = Message::from_vec(wire).map_err(ProxyError::Unpack)?;

        let address = self.upstream();
        let (reply, rtt) = self
            .exchanger
            .exchange(&query, &address)
            .await
            .map_err(|source| ProxyError::Exchange {
                address: address.clone(),
                source,
            })?;

        debug!(
            upstream = %address,
            id = reply.id(),
            rcode = ?reply.response_code(),
            rtt = ?rtt,
            "upstream replied"
        );

        reply.to_bytes().map_err(ProxyError::Pack)
    }
}

#[async_trait]
impl<E: Exchanger> Backend for ProxyBackend<E> {
    async fn query(&self, wire: &[u8]) -> Result<Vec<u8>, BackendError> {
        Ok(self.forward(wire).await?)
    }
}

/// Combine host and port into `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
