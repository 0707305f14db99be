//! Transport behavior table: how each return-shape category reads and
//! decodes a response.
//!
//! Every behavior checks the response status before any shape-specific
//! decoding, so error bodies never need to match the success type.

use crate::codec::Codec;
use crate::error::{Error, StatusFailure};
use crate::shape::{ReturnShape, ShapeKind};
use crate::sse;
use crate::transport::{AsyncRawBody, BodyMode, RawBody, RequestEcho, ResponseEnvelope};
use crate::Result;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;

use super::{AsyncReply, Reply, ResponseRewrite};

/// The body reading a category needs from the transport.
pub(crate) fn body_mode(kind: ShapeKind) -> BodyMode {
    match kind {
        ShapeKind::Object | ShapeKind::List | ShapeKind::Parametric | ShapeKind::Text => {
            BodyMode::Text
        }
        ShapeKind::Binary => BodyMode::Binary,
        ShapeKind::EventStream => BodyMode::Lines,
    }
}

/// Fully decoded non-stream payload, shared between the blocking and
/// futures paths.
enum Decoded {
    Object(Value),
    List(Vec<Value>),
    Parametric(Value),
    Text(String),
    Binary(Bytes),
}

impl Decoded {
    fn into_reply(self) -> Reply {
        match self {
            Decoded::Object(v) => Reply::Object(v),
            Decoded::List(v) => Reply::List(v),
            Decoded::Parametric(v) => Reply::Parametric(v),
            Decoded::Text(v) => Reply::Text(v),
            Decoded::Binary(v) => Reply::Binary(v),
        }
    }

    fn into_async_reply(self) -> AsyncReply {
        match self {
            Decoded::Object(v) => AsyncReply::Object(v),
            Decoded::List(v) => AsyncReply::List(v),
            Decoded::Parametric(v) => AsyncReply::Parametric(v),
            Decoded::Text(v) => AsyncReply::Text(v),
            Decoded::Binary(v) => AsyncReply::Binary(v),
        }
    }
}

fn status_error(
    status: u16,
    headers: Vec<(String, String)>,
    request: RequestEcho,
    body: String,
) -> Error {
    Error::http_status(StatusFailure {
        status,
        body,
        headers,
        request,
    })
}

fn decode_text(
    shape: &ReturnShape,
    mut text: String,
    codec: &dyn Codec,
    response_hook: Option<&ResponseRewrite>,
) -> Result<Decoded> {
    if let Some(hook) = response_hook {
        text = hook(text);
    }
    match shape.kind {
        ShapeKind::Text | ShapeKind::EventStream => Ok(Decoded::Text(text)),
        ShapeKind::Binary => Ok(Decoded::Binary(Bytes::from(text.into_bytes()))),
        ShapeKind::Object => Ok(Decoded::Object(codec.decode(&text, &shape.payload)?)),
        ShapeKind::Parametric => {
            let element = shape.element.as_deref().unwrap_or_default();
            Ok(Decoded::Parametric(codec.decode_parametric(
                &text,
                &shape.payload,
                element,
            )?))
        }
        ShapeKind::List => {
            let element = shape.element.as_deref().unwrap_or(&shape.payload);
            Ok(Decoded::List(codec.decode_list(&text, element)?))
        }
    }
}

/// Decode a blocking response according to the classified shape.
pub(crate) fn decode_blocking(
    shape: &ReturnShape,
    envelope: ResponseEnvelope<RawBody>,
    codec: Arc<dyn Codec>,
    response_hook: Option<&ResponseRewrite>,
    sentinel: &str,
) -> Result<Reply> {
    let ResponseEnvelope {
        status,
        headers,
        body,
        request,
    } = envelope;

    if !(200..300).contains(&status) {
        let text = match body {
            RawBody::Text(text) => text,
            RawBody::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            RawBody::Lines(lines) => materialize_lines(lines),
        };
        return Err(status_error(status, headers, request, text));
    }

    match body {
        RawBody::Binary(bytes) if shape.kind == ShapeKind::Binary => Ok(Reply::Binary(bytes)),
        RawBody::Lines(lines) if shape.kind == ShapeKind::EventStream => {
            let frames = sse::FrameIter::new(lines, sentinel);
            if shape.events.is_empty() {
                let element = shape.element.clone().unwrap_or_else(|| shape.payload.clone());
                Ok(Reply::Stream(sse::plain_payloads(frames, codec, element)))
            } else {
                Ok(Reply::Events(sse::named_events(
                    frames,
                    codec,
                    shape.events.clone(),
                )))
            }
        }
        // A backend answering with a different reading than requested is
        // still decoded as text.
        RawBody::Text(text) => {
            decode_text(shape, text, codec.as_ref(), response_hook).map(Decoded::into_reply)
        }
        RawBody::Binary(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            decode_text(shape, text, codec.as_ref(), response_hook).map(Decoded::into_reply)
        }
        RawBody::Lines(lines) => {
            let text = materialize_lines(lines);
            decode_text(shape, text, codec.as_ref(), response_hook).map(Decoded::into_reply)
        }
    }
}

/// Decode a futures response according to the classified shape.
pub(crate) async fn decode_async(
    shape: &ReturnShape,
    envelope: ResponseEnvelope<AsyncRawBody>,
    codec: Arc<dyn Codec>,
    response_hook: Option<&ResponseRewrite>,
    sentinel: &str,
) -> Result<AsyncReply> {
    let ResponseEnvelope {
        status,
        headers,
        body,
        request,
    } = envelope;

    if !(200..300).contains(&status) {
        let text = match body {
            AsyncRawBody::Text(text) => text,
            AsyncRawBody::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            AsyncRawBody::Lines(lines) => materialize_line_stream(lines).await,
        };
        return Err(status_error(status, headers, request, text));
    }

    match body {
        AsyncRawBody::Binary(bytes) if shape.kind == ShapeKind::Binary => {
            Ok(AsyncReply::Binary(bytes))
        }
        AsyncRawBody::Lines(lines) if shape.kind == ShapeKind::EventStream => {
            let frames = sse::frame_stream(lines, sentinel);
            if shape.events.is_empty() {
                let element = shape.element.clone().unwrap_or_else(|| shape.payload.clone());
                Ok(AsyncReply::Stream(sse::plain_payload_stream(
                    frames, codec, element,
                )))
            } else {
                Ok(AsyncReply::Events(sse::named_event_stream(
                    frames,
                    codec,
                    shape.events.clone(),
                )))
            }
        }
        AsyncRawBody::Text(text) => decode_text(shape, text, codec.as_ref(), response_hook)
            .map(Decoded::into_async_reply),
        AsyncRawBody::Binary(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            decode_text(shape, text, codec.as_ref(), response_hook)
                .map(Decoded::into_async_reply)
        }
        AsyncRawBody::Lines(lines) => {
            let text = materialize_line_stream(lines).await;
            decode_text(shape, text, codec.as_ref(), response_hook)
                .map(Decoded::into_async_reply)
        }
    }
}

/// Best-effort materialization of a lazy line body, for error diagnostics
/// and body-mode mismatches.
fn materialize_lines(lines: crate::transport::LineIter) -> String {
    lines
        .filter_map(|line| line.ok())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn materialize_line_stream(lines: crate::transport::LineStream) -> String {
    lines
        .filter_map(|line| futures::future::ready(line.ok()))
        .collect::<Vec<_>>()
        .await
        .join("\n")
}
