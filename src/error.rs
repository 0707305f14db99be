use crate::codec::CodecError;
use crate::transport::{RequestEcho, TransportError};
use thiserror::Error;

/// Unified error type for the restwire runtime.
///
/// Every failure mode of the pipeline maps to exactly one variant carrying
/// structured fields, so callers can match on the taxonomy instead of
/// unwrapping nested causes.
#[derive(Debug, Error)]
pub enum Error {
    /// A method declaration carries no HTTP verb and is not a pass-through
    /// default. Raised at descriptor build time.
    #[error("method '{method}' has no HTTP verb and is not a pass-through default")]
    MissingVerb { method: String },

    /// A `{placeholder}` token in a path template has no matching path-role
    /// parameter. Raised at descriptor build time.
    #[error("path placeholder '{{{placeholder}}}' in method '{method}' has no bound path parameter")]
    UnboundPathParam { placeholder: String, method: String },

    /// The declared return type does not classify into any supported
    /// category. Fatal and never retried.
    #[error("unsupported return shape '{declared}'")]
    UnsupportedShape { declared: String },

    /// The server answered outside the 2xx range. Carries the full response
    /// envelope so error bodies never need to match the success type.
    #[error("HTTP status {} from {} {}", .0.status, .0.request.verb, .0.request.url)]
    HttpStatus(Box<StatusFailure>),

    /// I/O, connect, or timeout failure reported by the transport backend.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encode/decode failure from the codec. Never retryable.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The retry engine gave up. Wraps the last underlying failure and the
    /// number of attempts actually made.
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted { attempts: u32, source: Box<Error> },
}

/// Everything known about a non-2xx response: status, body text, headers,
/// and an echo of the request that produced it.
#[derive(Debug, Clone)]
pub struct StatusFailure {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub request: RequestEcho,
}

impl Error {
    pub fn http_status(failure: StatusFailure) -> Self {
        Error::HttpStatus(Box::new(failure))
    }

    /// The HTTP status carried by this error, looking through the retry
    /// wrapper if present.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::HttpStatus(failure) => Some(failure.status),
            Error::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// The root failure, unwrapping `RetryExhausted`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
