// Package engine provides the typed value model, sizing and version minting.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value as JsonValue;

use crate::engine::error::CacheError;

/// Stored type discriminator, exposed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Json,
    Bytes,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Bytes => "bytes",
        }
    }
}

/// A typed cache payload. The engine never carries a schema-less "any
/// value"; the boundary validates into this sum before admission.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Canonical compact serialization of a JSON object or array.
    Json(Bytes),
    /// Raw decoded bytes.
    Blob(Bytes),
}

impl Value {
    /// Validates a wire value and infers its stored type.
    /// `base64_tagged` is the caller's `encoding: "base64"` hint.
    pub fn from_wire(raw: JsonValue, base64_tagged: bool) -> Result<Self, CacheError> {
        if base64_tagged {
            let JsonValue::String(text) = raw else {
                return Err(CacheError::BadRequest(
                    "base64 encoding requires a string value".to_string(),
                ));
            };
            let buf = BASE64
                .decode(text.as_bytes())
                .map_err(|e| CacheError::BadRequest(format!("invalid base64 value: {e}")))?;
            return Ok(Self::Blob(Bytes::from(buf)));
        }

        match raw {
            JsonValue::Null => Err(CacheError::BadRequest(
                "null is not a cacheable value".to_string(),
            )),
            JsonValue::Bool(flag) => Ok(Self::Bool(flag)),
            JsonValue::Number(num) => match num.as_f64().filter(|f| f.is_finite()) {
                Some(f) => Ok(Self::Number(f)),
                None => Err(CacheError::BadRequest(
                    "number must be a finite 64-bit float".to_string(),
                )),
            },
            JsonValue::String(text) => Ok(Self::Text(text)),
            composite @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                let buf = serde_json::to_vec(&composite)
                    .map_err(|e| CacheError::Internal(format!("json serialization: {e}")))?;
                Ok(Self::Json(Bytes::from(buf)))
            }
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::String,
            Self::Number(_) => ValueKind::Number,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Json(_) => ValueKind::Json,
            Self::Blob(_) => ValueKind::Bytes,
        }
    }

    /// Byte footprint charged against the shard budget.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Number(_) => 8,
            Self::Bool(_) => 1,
            Self::Json(buf) | Self::Blob(buf) => buf.len(),
        }
    }

    /// Renders the value back to its wire form. Blobs come back as a
    /// base64 string; the boundary re-attaches the encoding tag.
    pub fn to_wire(&self) -> JsonValue {
        match self {
            Self::Text(text) => JsonValue::String(text.clone()),
            Self::Number(num) => serde_json::Number::from_f64(*num)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Bool(flag) => JsonValue::Bool(*flag),
            Self::Json(buf) => serde_json::from_slice(buf).unwrap_or(JsonValue::Null),
            Self::Blob(buf) => JsonValue::String(BASE64.encode(buf)),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(num) => Some(*num),
            _ => None,
        }
    }
}

/// Mints a fresh CAS token: fixed-width millisecond prefix plus a random
/// suffix, so tokens sort lexicographically by mint time.
pub fn mint_version(now_ms: i64) -> String {
    format!("{:012x}{:016x}", now_ms, rand::random::<u64>())
}
