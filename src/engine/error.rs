// Package engine provides the typed failure taxonomy surfaced to the boundary.

use std::fmt;

/// Reason attached to an Overloaded rejection so clients and metrics
/// can tell the shedding layers apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadReason {
    MaxInflightExceeded,
    ShardMailboxFull,
    Draining,
}

impl OverloadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxInflightExceeded => "max_inflight_exceeded",
            Self::ShardMailboxFull => "shard_mailbox_full",
            Self::Draining => "draining",
        }
    }
}

impl fmt::Display for OverloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failures crossing the engine boundary.
/// Eviction and expiry are not errors; they surface as counters only.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("missing or invalid API token")]
    Unauthorized,

    #[error("key not found")]
    NotFound,

    #[error("version conflict on key {key:?}")]
    Conflict {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("payload of {size} bytes exceeds the limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("overloaded: {reason}")]
    Overloaded { reason: OverloadReason },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Stable machine-readable code used in wire error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Overloaded { .. } => "overloaded",
            Self::Internal(_) => "internal",
        }
    }
}
