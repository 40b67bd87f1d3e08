//! RFC 8484 request validation and the HTTP handler built on it.

use crate::error::{error_response, DohError};
use crate::{Backend, DOH_MEDIA_TYPE, MAX_POST_BODY};
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the query parameter carrying a GET request's DNS message.
const DNS_PARAM: &str = "dns";

/// Unpadded base64url that tolerates non-zero bits after the last full byte.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Writes one line per handled request through `tracing`.
///
/// Failures are logged at `WARN` as `<peer> | <error>`, successes at `INFO`
/// as `<peer> | successful <METHOD> request`. The peer shows as `unknown`
/// unless the server was started with
/// [`into_make_service_with_connect_info`](axum::Router::into_make_service_with_connect_info).
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestLogger {
    pub fn record(&self, peer: Option<SocketAddr>, method: &Method, outcome: &Result<(), DohError>) {
        let peer = peer.map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
        match outcome {
            Ok(()) => info!("{} | successful {} request", peer, method),
            Err(err) => warn!("{} | {}", peer, err),
        }
    }
}

struct DohState<B> {
    backend: Arc<B>,
    logger: Option<RequestLogger>,
}

impl<B> Clone for DohState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            logger: self.logger,
        }
    }
}

/// Build the DoH handler around `backend`.
///
/// The returned router answers on every path, so mount it with
/// [`Router::nest`] or serve it directly. Each request is validated per its
/// method, the extracted query is handed to `backend`, and exactly one
/// response is written: the wire-format reply, or a plain-text reason phrase
/// with the failure's status code.
pub fn handle_request<B: Backend>(backend: B, logger: Option<RequestLogger>) -> Router {
    let state = DohState {
        backend: Arc::new(backend),
        logger,
    };
    Router::new().fallback(serve::<B>).with_state(state)
}

async fn serve<B: Backend>(State(state): State<DohState<B>>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().clone();

    let (response, outcome) = match resolve(state.backend.as_ref(), request).await {
        Ok(reply) => (wire_response(reply), Ok(())),
        Err(err) => (error_response(err.status()), Err(err)),
    };

    if let Some(logger) = &state.logger {
        logger.record(peer, &method, &outcome);
    }

    response
}

/// Pull the query out of the request by method, then ask the backend.
async fn resolve<B: Backend>(backend: &B, request: Request) -> Result<Vec<u8>, DohError> {
    let method = request.method().clone();
    let query = if method == Method::GET {
        get_query(&request)?
    } else if method == Method::POST {
        post_query(request).await?
    } else {
        return Err(DohError::MethodNotAllowed(method));
    };

    Ok(backend.query(&query).await?)
}

fn wire_response(reply: Vec<u8>) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static(DOH_MEDIA_TYPE))],
        Bytes::from(reply),
    )
        .into_response()
}

/// Every value of the `dns` query parameter, in order.
fn dns_params(request: &Request) -> Result<Vec<String>, DohError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(request.uri()).map_err(|e| {
        DohError::MalformedQueryString(request.method().clone(), e.body_text())
    })?;

    Ok(pairs
        .into_iter()
        .filter(|(key, _)| key == DNS_PARAM)
        .map(|(_, value)| value)
        .collect())
}

/// RFC 8484 §4.1: a GET carries exactly one query, base64url encoded
/// without padding, in the `dns` parameter.
fn get_query(request: &Request) -> Result<Vec<u8>, DohError> {
    let values = dns_params(request)?;

    let value = match values.as_slice() {
        [] => return Err(DohError::MissingParam(Method::GET)),
        [value] => value,
        _ => return Err(DohError::DuplicateParam(Method::GET)),
    };

    if value.is_empty() {
        return Err(DohError::EmptyParam(Method::GET));
    }

    BASE64URL
        .decode(value)
        .map_err(|e| DohError::InvalidBase64(Method::GET, e))
}

/// RFC 8484 §4.1: a POST carries the unencoded query as its body, so the
/// URL must not also carry one.
async fn post_query(request: Request) -> Result<Vec<u8>, DohError> {
    if !dns_params(&request)?.is_empty() {
        return Err(DohError::ParamNotAllowed(Method::POST));
    }

    let content_type = request.headers().get(CONTENT_TYPE).map(HeaderValue::as_bytes);
    if content_type != Some(DOH_MEDIA_TYPE.as_bytes()) {
        return Err(DohError::UnsupportedMediaType(Method::POST));
    }

    let body = Limited::new(request.into_body(), MAX_POST_BODY)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                DohError::BodyTooLarge(Method::POST)
            } else {
                DohError::BodyRead(Method::POST, e.to_string())
            }
        })?
        .to_bytes();

    if body.is_empty() {
        return Err(DohError::EmptyBody(Method::POST));
    }

    Ok(body.to_vec())
}
