//! Request assembly: URL templating, query expansion, header flattening,
//! and body encoding.

mod multipart;

pub use multipart::{encode_multipart, probe_file, MultipartPayload, PartSource};

use crate::codec::Codec;
use crate::descriptor::{MethodDescriptor, ParamRole, ServiceDescriptor};
use crate::error::Error;
use bytes::Bytes;
use serde_json::Value;
use std::path::PathBuf;

/// One positional argument of an invocation.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A JSON-compatible value. `Value::Null` means "absent".
    Value(Value),
    /// A filesystem path, uploaded as a file part in multipart requests.
    File(PathBuf),
}

impl Arg {
    pub fn null() -> Self {
        Arg::Value(Value::Null)
    }

    fn is_null(&self) -> bool {
        matches!(self, Arg::Value(Value::Null))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

/// Body payload selected for a request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    None,
    /// JSON text produced by the codec.
    Json(String),
    /// Ordered binary chunks of an encoded multipart payload.
    Multipart(Vec<Bytes>),
}

/// Content-type marker, rendered to a header by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMarker {
    None,
    Json,
    Multipart { boundary: String },
}

impl ContentMarker {
    pub fn header_value(&self) -> Option<String> {
        match self {
            ContentMarker::None => None,
            ContentMarker::Json => Some("application/json".to_string()),
            ContentMarker::Multipart { boundary } => {
                Some(format!("multipart/form-data; boundary=\"{boundary}\""))
            }
        }
    }
}

/// A fully resolved outbound request, ready for a transport backend.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Absolute URL including the query string.
    pub url: String,
    pub verb: String,
    /// Flattened header pairs, order preserved, duplicates all sent.
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub content_type: ContentMarker,
}

/// Assemble a [`RequestContext`] for one invocation.
pub fn build_request(
    base_url: &str,
    service: &ServiceDescriptor,
    method: &MethodDescriptor,
    args: &[Arg],
    codec: &dyn Codec,
) -> Result<RequestContext, Error> {
    let null = Arg::null();
    let arg_at = |index: usize| args.get(index).unwrap_or(&null);

    let mut path = format!("{}{}", service.base_path, method.path);
    for param in method.params_with_role(ParamRole::Path) {
        if let Arg::Value(value) = arg_at(param.index) {
            let token = format!("{{{}}}", param.key);
            path = path.replace(&token, &scalar_text(value));
        }
    }

    let mut url = format!("{base_url}{path}");
    let mut wrote_query = false;
    for param in method.params_with_role(ParamRole::Query) {
        let arg = arg_at(param.index);
        if arg.is_null() {
            continue;
        }
        if param.key.is_empty() {
            // Whole-object binding: each field becomes its own pair,
            // null-valued fields dropped.
            if let Arg::Value(Value::Object(fields)) = arg {
                for (name, value) in fields {
                    if value.is_null() {
                        continue;
                    }
                    append_query(&mut url, &mut wrote_query, name, &query_text(value));
                }
            }
        } else {
            let text = match arg {
                Arg::Value(value) => query_text(value),
                Arg::File(p) => p.display().to_string(),
            };
            append_query(&mut url, &mut wrote_query, &param.key, &text);
        }
    }

    let (body, content_type) = if method.multipart {
        encode_multipart_body(method, args)?
    } else {
        encode_json_body(method, args, codec)?
    };

    Ok(RequestContext {
        url,
        verb: method.verb.clone(),
        headers: method.headers.clone(),
        body,
        content_type,
    })
}

fn append_query(url: &mut String, wrote: &mut bool, key: &str, value: &str) {
    url.push(if *wrote { '&' } else { '?' });
    url.push_str(key);
    url.push('=');
    url.push_str(value);
    *wrote = true;
}

fn encode_json_body(
    method: &MethodDescriptor,
    args: &[Arg],
    codec: &dyn Codec,
) -> Result<(RequestBody, ContentMarker), Error> {
    let body_arg = method
        .params_with_role(ParamRole::Body)
        .filter_map(|p| args.get(p.index))
        .find(|arg| !arg.is_null());
    match body_arg {
        Some(Arg::Value(value)) => {
            let text = codec.encode(value)?;
            Ok((RequestBody::Json(text), ContentMarker::Json))
        }
        Some(Arg::File(path)) => {
            let text = codec.encode(&Value::String(path.display().to_string()))?;
            Ok((RequestBody::Json(text), ContentMarker::Json))
        }
        None => Ok((RequestBody::None, ContentMarker::None)),
    }
}

fn encode_multipart_body(
    method: &MethodDescriptor,
    args: &[Arg],
) -> Result<(RequestBody, ContentMarker), Error> {
    let mut fields = Vec::new();
    for param in method
        .params
        .iter()
        .filter(|p| matches!(p.role, ParamRole::Body | ParamRole::BodyPart))
    {
        let Some(arg) = args.get(param.index) else {
            continue;
        };
        if arg.is_null() {
            continue;
        }
        let source = match arg {
            Arg::File(path) => PartSource::File(path.clone()),
            Arg::Value(Value::Array(items)) => {
                PartSource::Collection(items.iter().map(scalar_text).collect())
            }
            Arg::Value(value) => PartSource::Scalar(scalar_text(value)),
        };
        fields.push((param.key.clone(), source));
    }

    if fields.is_empty() {
        return Ok((RequestBody::None, ContentMarker::None));
    }

    let payload = encode_multipart(&fields)?;
    Ok((
        RequestBody::Multipart(payload.chunks),
        ContentMarker::Multipart {
            boundary: payload.boundary,
        },
    ))
}

/// String form of a value for path substitution and multipart scalars:
/// strings render bare, everything else as compact JSON.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// String form of a query value. Structured values render as compact JSON
/// rather than being flattened recursively.
fn query_text(value: &Value) -> String {
    scalar_text(value)
}
