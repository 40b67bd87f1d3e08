use axum::response::{IntoResponse, Response};
use http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderValue, Method, StatusCode};
use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Error returned by a [`Backend`](crate::Backend), paired with the HTTP
/// status the handler should answer with.
#[derive(Debug)]
pub struct BackendError {
    status: StatusCode,
    source: BoxError,
}

impl BackendError {
    pub fn new(status: StatusCode, source: impl Into<BoxError>) -> Self {
        Self {
            status,
            source: source.into(),
        }
    }

    /// Status written to the client.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_source(self) -> BoxError {
        self.source
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Reasons a DoH request is turned away.
#[derive(Debug, thiserror::Error)]
pub enum DohError {
    #[error("{0}: no 'dns' parameter in request")]
    MissingParam(Method),

    #[error("{0}: only 1 'dns' parameter is allowed")]
    DuplicateParam(Method),

    #[error("{0}: 'dns' parameter is empty")]
    EmptyParam(Method),

    #[error("{0}: 'dns' parameter is not valid unpadded base64url: {1}")]
    InvalidBase64(Method, #[source] base64::DecodeError),

    #[error("{0}: unable to parse query string: {1}")]
    MalformedQueryString(Method, String),

    #[error("{0}: 'dns' parameter not allowed")]
    ParamNotAllowed(Method),

    #[error("{0}: Content-Type must be {media_type}", media_type = crate::DOH_MEDIA_TYPE)]
    UnsupportedMediaType(Method),

    #[error("{0}: request body too large")]
    BodyTooLarge(Method),

    #[error("{0}: unable to read request body: {1}")]
    BodyRead(Method, String),

    #[error("{0}: empty body in request")]
    EmptyBody(Method),

    #[error("only {get} and {post} methods are supported, got {0}", get = Method::GET, post = Method::POST)]
    MethodNotAllowed(Method),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DohError {
    pub fn status(&self) -> StatusCode {
        match self {
            DohError::MissingParam(_)
            | DohError::EmptyParam(_)
            | DohError::InvalidBase64(..)
            | DohError::MalformedQueryString(..)
            | DohError::ParamNotAllowed(_)
            | DohError::EmptyBody(_) => StatusCode::BAD_REQUEST,
            DohError::DuplicateParam(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DohError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DohError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DohError::BodyRead(..) => StatusCode::INTERNAL_SERVER_ERROR,
            DohError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            DohError::Backend(e) => e.status(),
        }
    }
}

impl IntoResponse for DohError {
    fn into_response(self) -> Response {
        error_response(self.status())
    }
}

/// Plain-text reply carrying only the reason phrase, so clients learn the
/// failure class and nothing about internals.
pub(crate) fn error_response(status: StatusCode) -> Response {
    let mut response = (status, format!("{}\n", status_text(status))).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Reason phrase for a status code.
///
/// Mostly the `http` crate's canonical reasons, except 413 which keeps its
/// RFC 2616 wording.
pub fn status_text(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "Request Entity Too Large",
        other => other.canonical_reason().unwrap_or(""),
    }
}
