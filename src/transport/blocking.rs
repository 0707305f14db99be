//! Blocking-native transport backend on reqwest's blocking client.

use super::{
    BlockingTransportBackend, BodyMode, RawBody, RequestEcho, ResponseEnvelope, TransportError,
};
use crate::request::{RequestBody, RequestContext};
use bytes::Bytes;
use std::env;
use std::io::BufRead;
use std::time::Duration;

pub struct BlockingHttpTransport {
    client: reqwest::blocking::Client,
}

impl BlockingHttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let timeout_secs = env::var("RESTWIRE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    fn prepare(
        &self,
        request: &RequestContext,
    ) -> Result<reqwest::blocking::RequestBuilder, TransportError> {
        let method = reqwest::Method::from_bytes(request.verb.as_bytes())
            .map_err(|_| TransportError::Other(format!("invalid HTTP verb '{}'", request.verb)))?;
        let mut builder = self.client.request(method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = request.content_type.header_value() {
            builder = builder.header("Content-Type", content_type);
        }

        builder = match &request.body {
            RequestBody::None => builder,
            RequestBody::Json(text) => builder.body(text.clone()),
            RequestBody::Multipart(chunks) => {
                let mut joined = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
                for chunk in chunks {
                    joined.extend_from_slice(chunk);
                }
                builder.body(joined)
            }
        };
        Ok(builder)
    }
}

impl BlockingTransportBackend for BlockingHttpTransport {
    fn exchange(
        &self,
        request: &RequestContext,
        mode: BodyMode,
    ) -> Result<ResponseEnvelope<RawBody>, TransportError> {
        let response = self.prepare(request)?.send()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let echo = RequestEcho::of(request);

        let body = match mode {
            BodyMode::Text => RawBody::Text(response.text()?),
            BodyMode::Binary => RawBody::Binary(response.bytes()?),
            BodyMode::Lines => {
                // Lines are read off the socket as the consumer pulls.
                let reader = std::io::BufReader::new(response);
                RawBody::Lines(Box::new(
                    reader.lines().map(|r| r.map_err(TransportError::Io)),
                ))
            }
        };

        Ok(ResponseEnvelope {
            status,
            headers,
            body,
            request: echo,
        })
    }
}
