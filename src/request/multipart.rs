//! Multipart form-data encoding.
//!
//! The payload is an ordered list of binary chunks framed by a per-request
//! random boundary. Collection-valued fields expand into repeated parts
//! named `field[]`.

use crate::error::Error;
use crate::transport::TransportError;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Where a multipart field's content comes from.
#[derive(Debug, Clone)]
pub enum PartSource {
    /// Stringified scalar value.
    Scalar(String),
    /// File upload: bytes read from disk, MIME probed from the extension.
    File(PathBuf),
    /// Collection expanded into repeated `field[]` parts.
    Collection(Vec<String>),
}

/// An encoded multipart body.
#[derive(Debug, Clone)]
pub struct MultipartPayload {
    /// Random large integer, decimal-rendered, reused for the whole request.
    pub boundary: String,
    pub chunks: Vec<Bytes>,
}

const CRLF: &str = "\r\n";

/// Encode an ordered field map into a multipart byte sequence.
pub fn encode_multipart(fields: &[(String, PartSource)]) -> Result<MultipartPayload, Error> {
    let boundary = fastrand::u128(..).to_string();
    let mut chunks: Vec<Bytes> = Vec::new();

    for (name, source) in fields {
        match source {
            PartSource::Scalar(value) => {
                chunks.push(scalar_part(&boundary, name, value));
            }
            PartSource::File(path) => {
                let (bytes, mime) = probe_file(path)?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let head = format!(
                    "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"{CRLF}Content-Type: {mime}{CRLF}{CRLF}"
                );
                chunks.push(Bytes::from(head));
                chunks.push(bytes);
                chunks.push(Bytes::from_static(CRLF.as_bytes()));
            }
            PartSource::Collection(values) => {
                // Repeated parts all named `field[]`; the first reuses the
                // boundary and disposition already emitted for this field.
                let part_name = format!("{name}[]");
                for value in values {
                    chunks.push(scalar_part(&boundary, &part_name, value));
                }
            }
        }
    }

    chunks.push(Bytes::from(format!("--{boundary}--{CRLF}")));
    Ok(MultipartPayload { boundary, chunks })
}

fn scalar_part(boundary: &str, name: &str, value: &str) -> Bytes {
    Bytes::from(format!(
        "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{name}\"{CRLF}{CRLF}{value}{CRLF}"
    ))
}

/// Read a file and guess its MIME type from the extension, falling back to
/// `application/octet-stream`.
pub fn probe_file(path: &Path) -> Result<(Bytes, String), Error> {
    let bytes = std::fs::read(path).map_err(|e| Error::Transport(TransportError::Io(e)))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    };
    Ok((Bytes::from(bytes), mime.to_string()))
}
