// Package api provides shared wire DTOs and request validation.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::{Entry, SetRequest, Value, ValueKind};

use super::error::ApiError;

pub const MAX_KEY_BYTES: usize = 250;
pub const MAX_BATCH_ITEMS: usize = 100;

const IF_MATCH: &str = "if-match";
const IF_NONE_MATCH: &str = "if-none-match";
const BASE64_ENCODING: &str = "base64";

/// Body of a single-key set and of each batch-set item.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBody {
    pub value: JsonValue,
    pub ttl_sec: Option<u64>,
    pub encoding: Option<String>,
}

/// Wire rendition of an entry snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<&'static str>,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntryMeta>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_remaining_ms: Option<i64>,
    pub size_bytes: usize,
}

impl EntryResponse {
    pub fn from_entry(entry: &Entry, include_meta: bool, now_ms: i64) -> Self {
        let encoding = match entry.kind() {
            ValueKind::Bytes => Some(BASE64_ENCODING),
            _ => None,
        };
        let meta = include_meta.then(|| EntryMeta {
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            expires_at: entry.expires_at,
            ttl_remaining_ms: entry.ttl_remaining_ms(now_ms),
            size_bytes: entry.size_bytes,
        });
        Self {
            key: entry.key.to_string(),
            kind: entry.kind().as_str(),
            value: entry.value.to_wire(),
            encoding,
            version: entry.version.clone(),
            meta,
        }
    }
}

pub fn validate_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() || key.len() > MAX_KEY_BYTES {
        return Err(ApiError::bad_request(format!(
            "key length must be between 1 and {MAX_KEY_BYTES} bytes"
        )));
    }
    Ok(())
}

pub fn validate_batch_len(len: usize) -> Result<(), ApiError> {
    if len > MAX_BATCH_ITEMS {
        return Err(ApiError::bad_request(format!(
            "batch size exceeds {MAX_BATCH_ITEMS} items"
        )));
    }
    Ok(())
}

/// Builds an engine set request from wire parts.
pub fn build_set(
    key: &str,
    body: SetBody,
    if_match: Option<String>,
    if_none_match: bool,
) -> Result<SetRequest, ApiError> {
    validate_key(key)?;
    let tagged = match body.encoding.as_deref() {
        None => false,
        Some(BASE64_ENCODING) => true,
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "unsupported encoding {other:?}"
            )))
        }
    };
    let ttl_ms = match body.ttl_sec {
        None => None,
        Some(0) => return Err(ApiError::bad_request("ttlSec must be at least 1")),
        Some(sec) => Some(
            i64::try_from(sec)
                .ok()
                .and_then(|s| s.checked_mul(1000))
                .ok_or_else(|| ApiError::bad_request("ttlSec is too large"))?,
        ),
    };
    let value = Value::from_wire(body.value, tagged)?;
    Ok(SetRequest {
        key: Arc::from(key),
        value,
        ttl_ms,
        if_match,
        if_none_match,
    })
}

/// Parses CAS precondition headers. `If-None-Match` accepts only `*`.
pub fn preconditions(headers: &HeaderMap) -> Result<(Option<String>, bool), ApiError> {
    let if_match = match headers.get(IF_MATCH) {
        None => None,
        Some(raw) => Some(
            raw.to_str()
                .map_err(|_| ApiError::bad_request("invalid If-Match header"))?
                .trim()
                .to_string(),
        ),
    };
    let if_none_match = match headers.get(IF_NONE_MATCH) {
        None => false,
        Some(raw) if matches!(raw.to_str().map(str::trim), Ok("*")) => true,
        Some(_) => {
            return Err(ApiError::bad_request(
                "If-None-Match only supports \"*\" (create-only)",
            ))
        }
    };
    Ok((if_match, if_none_match))
}
