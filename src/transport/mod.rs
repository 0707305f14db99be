//! Transport backend contract and response envelope types.
//!
//! Two interchangeable backends perform the actual HTTP exchange: a
//! blocking-native one ([`blocking::BlockingHttpTransport`]) and a
//! futures-based one ([`http::HttpTransport`]). Everything above them works
//! against the traits defined here.

pub mod blocking;
pub mod http;

pub use blocking::BlockingHttpTransport;
pub use http::HttpTransport;

use crate::request::RequestContext;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// I/O-level failure reported by a backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failure: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport failure: {0}")]
    Other(String),
}

/// Coarse failure kind used by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Connect,
    Timeout,
    Io,
    Other,
}

impl TransportError {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportError::Connect(_) => TransportKind::Connect,
            TransportError::Timeout(_) => TransportKind::Timeout,
            TransportError::Io(_) => TransportKind::Io,
            TransportError::Other(_) => TransportKind::Other,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// How the behavior table wants the response body read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Text,
    Binary,
    Lines,
}

/// Echo of the originating request, kept for diagnostics on failures.
#[derive(Debug, Clone)]
pub struct RequestEcho {
    pub verb: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RequestEcho {
    pub fn of(request: &RequestContext) -> Self {
        Self {
            verb: request.verb.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
        }
    }
}

/// A response as delivered by a backend, generic over the body reading.
pub struct ResponseEnvelope<B> {
    pub status: u16,
    /// Header multimap as ordered pairs.
    pub headers: Vec<(String, String)>,
    pub body: B,
    pub request: RequestEcho,
}

impl<B> ResponseEnvelope<B> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Lazy pull-based line sequence from a blocking backend.
pub type LineIter = Box<dyn Iterator<Item = Result<String, TransportError>> + Send>;

/// Lazy line sequence from the futures backend.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Raw body delivered by the blocking backend.
pub enum RawBody {
    Text(String),
    Binary(Bytes),
    Lines(LineIter),
}

/// Raw body delivered by the futures backend.
pub enum AsyncRawBody {
    Text(String),
    Binary(Bytes),
    Lines(LineStream),
}

/// Blocking-native transport: the calling thread performs the exchange.
pub trait BlockingTransportBackend: Send + Sync {
    fn exchange(
        &self,
        request: &RequestContext,
        mode: BodyMode,
    ) -> Result<ResponseEnvelope<RawBody>, TransportError>;

    /// Release pooled connections. Default is a no-op.
    fn shutdown(&self) {}
}

/// Futures-based transport: the exchange completes on a background
/// execution context.
#[async_trait::async_trait]
pub trait TransportBackend: Send + Sync {
    async fn exchange(
        &self,
        request: &RequestContext,
        mode: BodyMode,
    ) -> Result<ResponseEnvelope<AsyncRawBody>, TransportError>;

    /// Release pooled connections. Default is a no-op.
    fn shutdown(&self) {}
}
