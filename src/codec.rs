//! Codec contract: JSON text in and out of the engine.
//!
//! The engine itself never interprets payload bytes; everything crosses this
//! boundary. Payloads travel as `serde_json::Value` and are decoded to
//! concrete types at the call site.

use serde_json::Value;
use thiserror::Error;

/// Encode/decode failure, carrying the offending text and the target type.
#[derive(Debug, Error)]
#[error("{operation} failed for target '{target}': {reason}")]
pub struct CodecError {
    pub operation: &'static str,
    pub target: String,
    pub reason: String,
    /// The text that failed to decode (or a description of the value that
    /// failed to encode), truncated for display.
    pub text: String,
}

impl CodecError {
    fn new(operation: &'static str, target: &str, reason: String, text: &str) -> Self {
        let mut text = text.to_string();
        if text.len() > 512 {
            text.truncate(512);
        }
        Self {
            operation,
            target: target.to_string(),
            reason,
            text,
        }
    }
}

/// External codec capability: plain, parametric, and list decoding.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, CodecError>;

    fn decode(&self, text: &str, target: &str) -> Result<Value, CodecError>;

    fn decode_parametric(
        &self,
        text: &str,
        container: &str,
        element: &str,
    ) -> Result<Value, CodecError>;

    fn decode_list(&self, text: &str, element: &str) -> Result<Vec<Value>, CodecError>;
}

/// Default codec backed by serde_json.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value)
            .map_err(|e| CodecError::new("encode", "json", e.to_string(), &value.to_string()))
    }

    fn decode(&self, text: &str, target: &str) -> Result<Value, CodecError> {
        serde_json::from_str(text)
            .map_err(|e| CodecError::new("decode", target, e.to_string(), text))
    }

    fn decode_parametric(
        &self,
        text: &str,
        container: &str,
        element: &str,
    ) -> Result<Value, CodecError> {
        let target = format!("{container}<{element}>");
        serde_json::from_str(text)
            .map_err(|e| CodecError::new("decode", &target, e.to_string(), text))
    }

    fn decode_list(&self, text: &str, element: &str) -> Result<Vec<Value>, CodecError> {
        let target = format!("list<{element}>");
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CodecError::new("decode", &target, e.to_string(), text))?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(CodecError::new(
                "decode",
                &target,
                format!("expected a JSON array, found {}", json_kind(&other)),
                text,
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
