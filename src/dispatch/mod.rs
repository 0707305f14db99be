//! Invocation dispatch: the front door of the runtime.
//!
//! A service adapter holds its pre-resolved descriptors and calls
//! [`Dispatcher::invoke_blocking`] or [`Dispatcher::invoke`] per method.
//! The dispatcher builds the request, classifies the return shape, applies
//! the configured hooks, and routes to the behavior table. A configured
//! retry policy wraps the exchange-and-decode step.

mod behavior;

use crate::codec::{Codec, JsonCodec};
use crate::descriptor::{DescriptorRegistry, MethodDescriptor, ServiceDescriptor};
use crate::error::Error;
use crate::request::{build_request, Arg, RequestContext};
use crate::retry::{self, RetryPolicy};
use crate::sse::{Event, EventIter, PayloadIter, DEFAULT_SENTINEL};
use crate::transport::{
    BlockingHttpTransport, BlockingTransportBackend, HttpTransport, TransportBackend,
    TransportError,
};
use crate::{BoxStream, Result};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Caller-supplied request rewrite, applied after assembly and before the
/// exchange. May change URL, headers, or body.
pub type RequestRewrite = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// Caller-supplied response rewrite, applied to the raw body text before
/// shape-specific decoding.
pub type ResponseRewrite = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Result of a blocking invocation. Stream variants are lazy, single-pass,
/// and non-restartable.
pub enum Reply {
    Object(Value),
    List(Vec<Value>),
    Parametric(Value),
    Text(String),
    Binary(Bytes),
    Stream(PayloadIter),
    Events(EventIter),
}

/// Result of a futures invocation.
pub enum AsyncReply {
    Object(Value),
    List(Vec<Value>),
    Parametric(Value),
    Text(String),
    Binary(Bytes),
    Stream(BoxStream<'static, Value>),
    Events(BoxStream<'static, Event>),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Object(v) => f.debug_tuple("Object").field(v).finish(),
            Reply::List(v) => f.debug_tuple("List").field(v).finish(),
            Reply::Parametric(v) => f.debug_tuple("Parametric").field(v).finish(),
            Reply::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Reply::Binary(v) => f.debug_tuple("Binary").field(v).finish(),
            Reply::Stream(_) => f.debug_tuple("Stream").finish(),
            Reply::Events(_) => f.debug_tuple("Events").finish(),
        }
    }
}

impl Reply {
    pub fn into_object(self) -> Option<Value> {
        match self {
            Reply::Object(v) | Reply::Parametric(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Reply::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Reply::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_binary(self) -> Option<Bytes> {
        match self {
            Reply::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<PayloadIter> {
        match self {
            Reply::Stream(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<EventIter> {
        match self {
            Reply::Events(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Debug for AsyncReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsyncReply::Object(v) => f.debug_tuple("Object").field(v).finish(),
            AsyncReply::List(v) => f.debug_tuple("List").field(v).finish(),
            AsyncReply::Parametric(v) => f.debug_tuple("Parametric").field(v).finish(),
            AsyncReply::Text(v) => f.debug_tuple("Text").field(v).finish(),
            AsyncReply::Binary(v) => f.debug_tuple("Binary").field(v).finish(),
            AsyncReply::Stream(_) => f.debug_tuple("Stream").finish(),
            AsyncReply::Events(_) => f.debug_tuple("Events").finish(),
        }
    }
}

impl AsyncReply {
    pub fn into_object(self) -> Option<Value> {
        match self {
            AsyncReply::Object(v) | AsyncReply::Parametric(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            AsyncReply::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            AsyncReply::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_binary(self) -> Option<Bytes> {
        match self {
            AsyncReply::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<BoxStream<'static, Value>> {
        match self {
            AsyncReply::Stream(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<BoxStream<'static, Event>> {
        match self {
            AsyncReply::Events(v) => Some(v),
            _ => None,
        }
    }
}

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder {
    base_url: String,
    sentinel: String,
    codec: Option<Arc<dyn Codec>>,
    transport: Option<Arc<dyn TransportBackend>>,
    blocking: Option<Arc<dyn BlockingTransportBackend>>,
    retry: Option<RetryPolicy>,
    request_hook: Option<RequestRewrite>,
    response_hook: Option<ResponseRewrite>,
}

impl DispatcherBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            codec: None,
            transport: None,
            blocking: None,
            retry: None,
            request_hook: None,
            response_hook: None,
        }
    }

    /// End-of-stream sentinel line for event streams.
    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn TransportBackend>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn blocking_transport(mut self, transport: Arc<dyn BlockingTransportBackend>) -> Self {
        self.blocking = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn request_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    pub fn response_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.response_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::Transport(TransportError::Other(format!(
                "invalid base URL '{}': {e}",
                self.base_url
            )))
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        // The blocking backend is built on first blocking invocation, so
        // building a dispatcher inside an async runtime never touches the
        // blocking client.
        let blocking = OnceCell::new();
        if let Some(backend) = self.blocking {
            let _ = blocking.set(backend);
        }

        Ok(Dispatcher {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            sentinel: self.sentinel,
            registry: DescriptorRegistry::new(),
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            transport,
            blocking,
            retry: self.retry,
            request_hook: self.request_hook,
            response_hook: self.response_hook,
        })
    }
}

/// The invocation front door. One dispatcher per endpoint; cheap to share
/// behind an `Arc`.
pub struct Dispatcher {
    base_url: String,
    sentinel: String,
    registry: DescriptorRegistry,
    codec: Arc<dyn Codec>,
    transport: Arc<dyn TransportBackend>,
    blocking: OnceCell<Arc<dyn BlockingTransportBackend>>,
    retry: Option<RetryPolicy>,
    request_hook: Option<RequestRewrite>,
    response_hook: Option<ResponseRewrite>,
}

impl Dispatcher {
    pub fn builder(base_url: impl Into<String>) -> DispatcherBuilder {
        DispatcherBuilder::new(base_url)
    }

    /// Memoized descriptor collection: the first call runs `collect`, later
    /// calls return the cached descriptor.
    pub fn service<F>(&self, name: &str, collect: F) -> Result<Arc<ServiceDescriptor>>
    where
        F: FnOnce() -> Result<ServiceDescriptor>,
    {
        self.registry.resolve(name, collect)
    }

    /// Release pooled transport connections.
    pub fn shutdown(&self) {
        self.transport.shutdown();
        if let Some(blocking) = self.blocking.get() {
            blocking.shutdown();
        }
    }

    fn blocking_backend(&self) -> Result<&Arc<dyn BlockingTransportBackend>> {
        self.blocking.get_or_try_init(|| {
            let backend = BlockingHttpTransport::new()?;
            Ok(Arc::new(backend) as Arc<dyn BlockingTransportBackend>)
        })
    }

    fn resolve(
        &self,
        method: &MethodDescriptor,
        service: &ServiceDescriptor,
        args: &[Arg],
    ) -> Result<(RequestContext, crate::shape::ReturnShape)> {
        if method.passthrough {
            // Pass-through defaults carry no verb and are never dispatched.
            return Err(Error::MissingVerb {
                method: method.name.clone(),
            });
        }
        let shape = method.shape()?.clone();
        let mut request = build_request(&self.base_url, service, method, args, self.codec.as_ref())?;
        if let Some(hook) = &self.request_hook {
            hook(&mut request);
        }
        Ok((request, shape))
    }

    /// Blocking invocation: the calling thread performs the exchange and,
    /// for stream shapes, pulls lines lazily from the returned iterator.
    pub fn invoke_blocking(
        &self,
        service: &ServiceDescriptor,
        method: &MethodDescriptor,
        args: &[Arg],
    ) -> Result<Reply> {
        let (request, shape) = self.resolve(method, service, args)?;
        let call_id = Uuid::new_v4();
        debug!(
            %call_id,
            verb = request.verb.as_str(),
            url = request.url.as_str(),
            method = method.name.as_str(),
            "dispatching blocking request"
        );
        let started = Instant::now();

        let backend = self.blocking_backend()?;
        let attempt = || {
            let envelope = backend.exchange(&request, behavior::body_mode(shape.kind))?;
            behavior::decode_blocking(
                &shape,
                envelope,
                self.codec.clone(),
                self.response_hook.as_ref(),
                &self.sentinel,
            )
        };

        let result = match &self.retry {
            Some(policy) => retry::run_blocking(policy, attempt),
            None => attempt(),
        };

        if let Err(error) = &result {
            info!(
                %call_id,
                method = method.name.as_str(),
                url = request.url.as_str(),
                status = error.status_code(),
                duration_ms = started.elapsed().as_millis() as u64,
                "blocking request failed"
            );
        }
        result
    }

    /// Futures invocation: returns once the exchange (and for stream shapes,
    /// the handshake) completes; stream bodies decode as the consumer pulls.
    pub async fn invoke(
        &self,
        service: &ServiceDescriptor,
        method: &MethodDescriptor,
        args: &[Arg],
    ) -> Result<AsyncReply> {
        let (request, shape) = self.resolve(method, service, args)?;
        let call_id = Uuid::new_v4();
        debug!(
            %call_id,
            verb = request.verb.as_str(),
            url = request.url.as_str(),
            method = method.name.as_str(),
            "dispatching request"
        );
        let started = Instant::now();

        let attempt = || {
            let request = request.clone();
            let shape = shape.clone();
            let transport = self.transport.clone();
            let codec = self.codec.clone();
            let response_hook = self.response_hook.clone();
            let sentinel = self.sentinel.clone();
            async move {
                let envelope = transport
                    .exchange(&request, behavior::body_mode(shape.kind))
                    .await?;
                behavior::decode_async(
                    &shape,
                    envelope,
                    codec,
                    response_hook.as_ref(),
                    &sentinel,
                )
                .await
            }
        };

        let result = match &self.retry {
            Some(policy) => retry::run(policy, attempt).await,
            None => attempt().await,
        };

        if let Err(error) = &result {
            info!(
                %call_id,
                method = method.name.as_str(),
                url = request.url.as_str(),
                status = error.status_code(),
                duration_ms = started.elapsed().as_millis() as u64,
                "request failed"
            );
        }
        result
    }
}
