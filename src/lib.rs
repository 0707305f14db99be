//! # restwire
//!
//! Declarative HTTP client runtime: describe a service once - verbs, path
//! templates, parameter roles, headers, return shape - and invoke it as
//! plain calls that come back as typed results, synchronously or
//! asynchronously, as objects, lists, parametric containers, text, bytes,
//! or server-sent-event streams.
//!
//! ## Overview
//!
//! A [`descriptor::ServiceDescriptor`] is built once through the builder
//! API and cached. Each invocation resolves its method descriptor, builds
//! the request (URL templating, query expansion, JSON or multipart body),
//! classifies the declared return shape, and routes the exchange to one of
//! two transport backends: blocking-native or futures-based. Stream shapes
//! run the response through the SSE parser lazily; a configured
//! [`retry::RetryPolicy`] wraps the whole exchange with backoff and jitter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use restwire::descriptor::{MethodBuilder, ServiceBuilder};
//! use restwire::request::Arg;
//! use restwire::Dispatcher;
//! use serde_json::json;
//!
//! # fn main() -> restwire::Result<()> {
//! let dispatcher = Dispatcher::builder("https://api.example.com").build()?;
//! let users = dispatcher.service("Users", || {
//!     ServiceBuilder::new("Users")
//!         .base_path("/v1")
//!         .method(
//!             MethodBuilder::new("find")
//!                 .get("/users/{id}")
//!                 .path_param(0, "id")
//!                 .returns("User"),
//!         )
//!         .build()
//! })?;
//!
//! let method = users.method("find").expect("declared above");
//! let reply = dispatcher.invoke_blocking(&users, method, &[Arg::Value(json!(42))])?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`descriptor`] | Service metadata model, builder, and cache |
//! | [`shape`] | Return-shape classification |
//! | [`request`] | URL templating, query expansion, body encoding |
//! | [`dispatch`] | Invocation front door and behavior table |
//! | [`transport`] | Backend contract plus reqwest backends |
//! | [`sse`] | Server-sent-event parsing and mapping |
//! | [`retry`] | Backoff, jitter, retryability classification |
//! | [`codec`] | JSON codec contract and default implementation |

pub mod codec;
pub mod descriptor;
pub mod dispatch;
pub mod request;
pub mod retry;
pub mod shape;
pub mod sse;
pub mod transport;

/// Error type for the library
pub mod error;
pub use error::{Error, StatusFailure};

// Re-export main types for convenience
pub use codec::{Codec, JsonCodec};
pub use descriptor::{MethodBuilder, ServiceBuilder};
pub use dispatch::{AsyncReply, Dispatcher, DispatcherBuilder, Reply};
pub use request::{Arg, RequestContext};
pub use retry::{RetryPolicy, StatusRange};
pub use shape::{ReturnShape, ShapeKind};
pub use sse::Event;
pub use transport::{TransportError, TransportKind};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;
