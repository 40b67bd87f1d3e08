//! # DoH Proxy
//!
//! A DNS-over-HTTPS (RFC 8484) front end that validates wire-format queries
//! arriving over HTTP and forwards them to a recursive resolver.
//!
//! ## Features
//!
//! - GET (`?dns=<base64url>`) and POST (`application/dns-udpwireformat` body) requests
//! - Strict request validation with distinct HTTP status codes per failure
//! - Pluggable [`Backend`]: the bundled [`ProxyBackend`] forwards to an upstream resolver
//! - Pluggable [`Exchanger`]: swap the UDP/TCP client for a mock or another transport
//! - Upstream servers taken from `/etc/resolv.conf` when none are configured
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doh_proxy::{handle_request, ProxyBackend, ProxyConfig, RequestLogger};
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Forward to the first nameserver listed in /etc/resolv.conf
//!     let backend = ProxyBackend::new(ProxyConfig::default())?;
//!     let app = handle_request(backend, Some(RequestLogger));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8053").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Backend
//!
//! ```rust
//! use doh_proxy::{Backend, BackendError};
//!
//! /// Answers every query with the query itself.
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Backend for Echo {
//!     async fn query(&self, wire: &[u8]) -> Result<Vec<u8>, BackendError> {
//!         Ok(wire.to_vec())
//!     }
//! }
//!
//! let app = doh_proxy::handle_request(Echo, None);
//! # let _ = app;
//! ```

mod error;
mod exchange;
mod handler;
mod proxy;
mod resolv_conf;

pub use error::{status_text, BackendError, DohError};
pub use exchange::{DnsClient, ExchangeError, Exchanger, Transport};
pub use handler::{handle_request, RequestLogger};
pub use proxy::{join_host_port, ProxyBackend, ProxyConfig, ProxyError};
pub use resolv_conf::{ResolvConf, ResolvConfError};

use async_trait::async_trait;

/// Media type of DNS wire-format request and response bodies.
pub const DOH_MEDIA_TYPE: &str = "application/dns-udpwireformat";

/// Largest POST body accepted, twice the common EDNS0 buffer size of 4096.
pub const MAX_POST_BODY: usize = 8192;

/// Port used for upstream resolvers when none is configured.
pub const DEFAULT_PORT: &str = "53";

/// Resolver configuration read when no upstream servers are configured.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Answers wire-format DNS queries on behalf of the HTTP handler.
///
/// The handler never looks past this trait: it passes the raw query bytes in
/// and writes whatever comes back. On failure the returned [`BackendError`]
/// decides the HTTP status of the response.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Resolve one wire-format query into a wire-format reply.
    async fn query(&self, wire: &[u8]) -> Result<Vec<u8>, BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    async fn query(&self, wire: &[u8]) -> Result<Vec<u8>, BackendError> {
        (**self).query(wire).await
    }
}
