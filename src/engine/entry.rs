// Package engine provides the stored entry model.

use std::sync::Arc;

use crate::engine::value::{Value, ValueKind};

/// A stored cache entry.
///
/// Clones are cheap (`Arc<str>` key, `Bytes` payloads) and are handed out
/// as read-time snapshots; no clone aliases the shard's mutable state.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Arc<str>,
    pub value: Value,
    pub version: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub expires_at: Option<i64>,
    pub size_bytes: usize,
}

impl Entry {
    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// True once wall-clock has passed the expiry deadline. An expired
    /// entry is a tombstone for reads even before the sweeper removes it.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_ms)
    }

    /// Remaining lifetime in milliseconds, if a TTL is set.
    pub fn ttl_remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.expires_at.map(|at| (at - now_ms).max(0))
    }
}
