//! Futures-based transport backend on reqwest.

use super::{
    AsyncRawBody, BodyMode, LineStream, RequestEcho, ResponseEnvelope, TransportBackend,
    TransportError,
};
use crate::request::{RequestBody, RequestContext};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use std::env;
use std::time::Duration;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Production-friendly defaults, env-overridable.
        let timeout_secs = env::var("RESTWIRE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(
                env::var("RESTWIRE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn prepare(&self, request: &RequestContext) -> Result<reqwest::RequestBuilder, TransportError> {
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

#[async_trait::async_trait]
impl TransportBackend for HttpTransport {
    async fn exchange(
        &self,
        request: &RequestContext,
        mode: BodyMode,
    ) -> Result<ResponseEnvelope<AsyncRawBody>, TransportError> {
        let response = self.prepare(request)?.send().await?;

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
            BodyMode::Text => AsyncRawBody::Text(response.text().await?),
            BodyMode::Binary => AsyncRawBody::Binary(response.bytes().await?),
            BodyMode::Lines => {
                AsyncRawBody::Lines(split_lines(response.bytes_stream().map_err(Into::into)))
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

/// Split a byte stream into lines, lazily as the consumer pulls. Trailing
/// `\r` is stripped; a final unterminated line is still yielded.
pub(crate) fn split_lines<S>(bytes: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
{
    let stream = stream::unfold(
        (Box::pin(bytes), String::new(), false),
        |(mut inner, mut buf, mut eof)| async move {
            loop {
                if let Some(idx) = buf.find('\n') {
                    let mut line = buf[..idx].to_string();
                    buf = buf[idx + 1..].to_string();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                    return Some((Ok(line), (inner, buf, eof)));
                }
                if eof {
                    if buf.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buf);
                    return Some((Ok(line), (inner, buf, eof)));
                }
                match inner.next().await {
                    Some(Ok(chunk)) => buf.push_str(&String::from_utf8_lossy(&chunk)),
                    Some(Err(e)) => return Some((Err(e), (inner, buf, eof))),
                    None => eof = true,
                }
            }
        },
    );
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ContentMarker;

    #[tokio::test]
    async fn split_lines_handles_chunk_boundaries_and_crlf() {
        let chunks = vec![
            Ok(Bytes::from("data: a\r\nda")),
            Ok(Bytes::from("ta: b\n\ntail")),
        ];
        let lines = split_lines(stream::iter(chunks));
        let collected: Vec<String> = lines.map(|r| r.unwrap()).collect().await;
        assert_eq!(collected, vec!["data: a", "data: b", "", "tail"]);
    }

    #[test]
    fn invalid_verb_is_rejected_before_sending() {
        let transport = HttpTransport::new().unwrap();
        let request = RequestContext {
            url: "http://localhost/".to_string(),
            verb: "NOT A VERB".to_string(),
            headers: Vec::new(),
            body: RequestBody::None,
            content_type: ContentMarker::None,
        };
        assert!(transport.prepare(&request).is_err());
    }
}
