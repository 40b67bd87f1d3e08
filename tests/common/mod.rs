#![allow(dead_code)]
use axum::body::Body;
use axum::Router;
use doh_proxy::{DnsClient, ProxyBackend, ProxyConfig};
use http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use trust_dns_proto::op::{Message, MessageType, Query};
use trust_dns_proto::rr::rdata::A;
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::BinEncodable;

pub const MIME: &str = "application/dns-udpwireformat";

/// www.example.com A, id 0, RD set.
pub const WWW_EXAMPLE_B64: &str = "AAABAAABAAAAAAAAA3d3dwdleGFtcGxlA2NvbQAAAQAB";

/// noresponse.example.com A, id 0, RD set.
pub const NORESPONSE_B64: &str = "AAABAAABAAAAAAAACm5vcmVzcG9uc2UHZXhhbXBsZQNjb20AAAEAAQ";

pub const WWW_EXAMPLE_WIRE: [u8; 33] = [
    0x0, 0x0, 0x1, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0x3, 0x77, 0x77, 0x77, 0x7, 0x65,
    0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x3, 0x63, 0x6f, 0x6d, 0x0, 0x0, 0x1, 0x0, 0x1,
];

pub const NORESPONSE_WIRE: [u8; 40] = [
    0x0, 0x0, 0x1, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x0, 0xa, 0x6e, 0x6f, 0x72, 0x65, 0x73,
    0x70, 0x6f, 0x6e, 0x73, 0x65, 0x7, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x3, 0x63, 0x6f,
    0x6d, 0x0, 0x0, 0x1, 0x0, 0x1,
];

/// Upstream timeout used against the mock resolver.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(300);

/// UDP resolver that answers `www.example.com. A` with 127.0.0.1 and stays
/// silent for every other question.
pub struct MockResolver {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockResolver {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                if let Some(reply) = Self::answer(&buf[..len]) {
                    let _ = socket.send_to(&reply, peer).await;
                }
            }
        });

        Self { addr, task }
    }

    fn answer(wire: &[u8]) -> Option<Vec<u8>> {
        let request = Message::from_vec(wire).ok()?;
        let question = request.queries().first()?;
        if question.query_type() != RecordType::A
            || question.name() != &Name::from_ascii("www.example.com.").ok()?
        {
            return None;
        }

        let mut reply = Message::new();
        reply
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_authoritative(true)
            .add_queries(request.queries().to_vec())
            .add_answer(Record::from_rdata(
                question.name().clone(),
                60,
                RData::A(A(Ipv4Addr::LOCALHOST)),
            ));
        reply.to_bytes().ok()
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    /// Proxy configuration pointing at this resolver.
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            servers: vec![self.addr.ip().to_string()],
            port: Some(self.port()),
            resolv_conf: None,
        }
    }

    /// Proxy backend pointing at this resolver with a short timeout.
    pub fn backend(&self) -> ProxyBackend {
        ProxyBackend::with_exchanger(
            self.proxy_config(),
            DnsClient::new().with_timeout(TEST_TIMEOUT),
        )
        .unwrap()
    }
}

impl Drop for MockResolver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Build a wire-format A query with the given id.
pub fn a_query(id: u16, name: &str) -> Vec<u8> {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
    message.to_bytes().unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn content_type(&self) -> &str {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap())
            .unwrap_or("")
    }

    pub fn message(&self) -> Message {
        Message::from_vec(&self.body).expect("response body is not a DNS message")
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str, content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::post(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(http::header::CONTENT_TYPE, content_type);
    }
    builder.body(body.into()).unwrap()
}
