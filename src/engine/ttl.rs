// Package engine provides the expiration min-heap.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A scheduled expiration.
///
/// Records are never removed when their entry is overwritten or deleted;
/// the shard validates each popped record against the live entry instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRecord {
    pub expires_at: i64,
    pub key: Arc<str>,
}

impl Ord for ExpiryRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expires_at
            .cmp(&other.expires_at)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for ExpiryRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Binary min-heap ordered by `expires_at` ascending.
#[derive(Debug, Default)]
pub struct ExpiryHeap {
    heap: BinaryHeap<Reverse<ExpiryRecord>>,
}

impl ExpiryHeap {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, key: Arc<str>, expires_at: i64) {
        self.heap.push(Reverse(ExpiryRecord { expires_at, key }));
    }

    /// Earliest scheduled expiration, if any.
    pub fn peek(&self) -> Option<&ExpiryRecord> {
        self.heap.peek().map(|Reverse(rec)| rec)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pops records with `expires_at <= now`, at most `limit` of them.
    /// The bound keeps a single sweep from monopolizing the mailbox.
    pub fn pop_expired(&mut self, now: i64, limit: usize) -> Vec<ExpiryRecord> {
        let mut due = Vec::new();
        while due.len() < limit {
            let ripe = matches!(self.heap.peek(), Some(Reverse(rec)) if rec.expires_at <= now);
            if !ripe {
                break;
            }
            if let Some(Reverse(rec)) = self.heap.pop() {
                due.push(rec);
            }
        }
        due
    }
}
