// Package engine provides the store façade: routing, admission,
// batch orchestration and aggregated stats.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::entry::Entry;
use crate::engine::error::{CacheError, OverloadReason};
use crate::engine::hasher;
use crate::engine::shard::{
    IncrOutcome, SetOutcome, SetRequest, Shard, ShardConfig, ShardStats,
};

/// Engine-level configuration, derived from the boundary config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub shards: usize,
    pub max_inflight: usize,
    pub max_shard_mailbox: usize,
    pub max_item_bytes: usize,
    /// Total byte budget, divided equally across shards. None disables
    /// eviction by bytes.
    pub memory_budget_bytes: Option<u64>,
    pub sweep_interval: Duration,
    pub sweep_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            max_inflight: 1024,
            max_shard_mailbox: 1024,
            max_item_bytes: 256 * 1024 * 1024,
            memory_budget_bytes: None,
            sweep_interval: Duration::from_secs(1),
            sweep_batch: 256,
        }
    }
}

/// Result of a batch read.
#[derive(Debug, Default)]
pub struct BatchGetResult {
    pub hits: Vec<Entry>,
    pub misses: Vec<Arc<str>>,
}

/// Per-item result of a batch write, in input order.
#[derive(Debug)]
pub struct BatchSetResult {
    pub key: Arc<str>,
    pub result: Result<SetOutcome, CacheError>,
}

/// Per-item result of a batch delete, in input order.
#[derive(Debug)]
pub struct BatchDeleteResult {
    pub key: Arc<str>,
    pub result: Result<bool, CacheError>,
}

/// Aggregated store statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub shards: Vec<ShardStats>,
    pub entries: u64,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub conflicts: u64,
    pub in_flight: u64,
    pub overloaded_inflight: u64,
    pub overloaded_mailbox: u64,
    /// Coefficient of variation of entry counts across shards.
    pub imbalance: f64,
}

/// Sharded store. Routes keys to their owning shard, enforces the
/// store-wide in-flight cap and orchestrates batches.
pub struct Store {
    shards: Vec<Shard>,
    cfg: EngineConfig,
    in_flight: AtomicUsize,
    overloaded_inflight: AtomicU64,
    overloaded_mailbox: AtomicU64,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl Store {
    /// Spawns all shards. The store cancels a child of the given token on
    /// close, so closing the store never tears down the parent.
    pub fn new(cfg: EngineConfig, parent: CancellationToken) -> Arc<Self> {
        let shutdown = parent.child_token();
        let per_shard_budget = cfg
            .memory_budget_bytes
            .map(|total| total / cfg.shards.max(1) as u64);
        let shards = (0..cfg.shards)
            .map(|id| {
                Shard::spawn(
                    id,
                    ShardConfig {
                        mailbox_capacity: cfg.max_shard_mailbox,
                        max_item_bytes: cfg.max_item_bytes,
                        max_bytes: per_shard_budget,
                        sweep_interval: cfg.sweep_interval,
                        sweep_batch: cfg.sweep_batch,
                    },
                    shutdown.child_token(),
                )
            })
            .collect();

        info!(
            component = "store",
            event = "started",
            shards = cfg.shards,
            max_inflight = cfg.max_inflight,
            "store started"
        );

        Arc::new(Self {
            shards,
            cfg,
            in_flight: AtomicUsize::new(0),
            overloaded_inflight: AtomicU64::new(0),
            overloaded_mailbox: AtomicU64::new(0),
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    /// True while the store accepts new admissions.
    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::Relaxed) && !self.shutdown.is_cancelled()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn get(&self, key: &str) -> Result<Option<Entry>, CacheError> {
        let _guard = self.admit()?;
        Ok(self.shard_for(key).get(key))
    }

    pub async fn set(&self, req: SetRequest) -> Result<SetOutcome, CacheError> {
        let _guard = self.admit()?;
        let result = self.shard_for(req.key.as_ref()).set(req).await;
        self.note_overload(&result);
        result
    }

    pub async fn delete(
        &self,
        key: Arc<str>,
        if_match: Option<String>,
    ) -> Result<bool, CacheError> {
        let _guard = self.admit()?;
        let result = self.shard_for(key.as_ref()).delete(key, if_match).await;
        self.note_overload(&result);
        result
    }

    pub async fn increment(&self, key: Arc<str>, delta: f64) -> Result<IncrOutcome, CacheError> {
        let _guard = self.admit()?;
        let result = self.shard_for(key.as_ref()).increment(key, delta).await;
        self.note_overload(&result);
        result
    }

    /// Batch read: each key hits its owning shard's read fast path.
    /// Counts as a single in-flight admission.
    pub fn batch_get(&self, keys: &[Arc<str>]) -> Result<BatchGetResult, CacheError> {
        let _guard = self.admit()?;
        let mut out = BatchGetResult::default();
        for key in keys {
            match self.shard_for(key.as_ref()).get(key.as_ref()) {
                Some(entry) => out.hits.push(entry),
                None => out.misses.push(key.clone()),
            }
        }
        Ok(out)
    }

    /// Batch write fan-out. Results come back in input order; items fail
    /// independently (no atomic batch boundary).
    pub async fn batch_set(
        &self,
        items: Vec<SetRequest>,
    ) -> Result<Vec<BatchSetResult>, CacheError> {
        let _guard = self.admit()?;
        let pending: Vec<_> = items
            .into_iter()
            .map(|req| {
                let key = req.key.clone();
                let shard = self.shard_for(req.key.as_ref());
                async move {
                    let result = shard.set(req).await;
                    BatchSetResult { key, result }
                }
            })
            .collect();
        let results = futures::future::join_all(pending).await;
        for item in &results {
            self.note_overload(&item.result);
        }
        Ok(results)
    }

    pub async fn batch_delete(
        &self,
        keys: Vec<Arc<str>>,
    ) -> Result<Vec<BatchDeleteResult>, CacheError> {
        let _guard = self.admit()?;
        let pending: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let shard = self.shard_for(key.as_ref());
                async move {
                    let result = shard.delete(key.clone(), None).await;
                    BatchDeleteResult { key, result }
                }
            })
            .collect();
        let results = futures::future::join_all(pending).await;
        for item in &results {
            self.note_overload(&item.result);
        }
        Ok(results)
    }

    pub fn stats(&self) -> StoreStats {
        let shards: Vec<ShardStats> = self.shards.iter().map(Shard::stats).collect();

        let mut totals = StoreStats {
            in_flight: self.in_flight.load(Ordering::Relaxed) as u64,
            overloaded_inflight: self.overloaded_inflight.load(Ordering::Relaxed),
            overloaded_mailbox: self.overloaded_mailbox.load(Ordering::Relaxed),
            ..StoreStats::default()
        };
        for shard in &shards {
            totals.entries += shard.entries;
            totals.bytes += shard.bytes;
            totals.hits += shard.hits;
            totals.misses += shard.misses;
            totals.sets += shard.sets;
            totals.deletes += shard.deletes;
            totals.evictions += shard.evictions;
            totals.expirations += shard.expirations;
            totals.conflicts += shard.conflicts;
        }
        totals.imbalance = imbalance(&shards);
        totals.shards = shards;
        totals
    }

    /// Drains and joins all shards. Reads keep working on the retained
    /// data; new admissions are refused.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.shutdown.cancel();
        for shard in &self.shards {
            shard.close().await;
        }
        info!(component = "store", event = "closed", "store closed");
    }

    fn shard_for(&self, key: &str) -> &Shard {
        &self.shards[hasher::shard_of(key, self.shards.len())]
    }

    fn admit(&self) -> Result<InFlightGuard<'_>, CacheError> {
        if !self.is_running() {
            return Err(CacheError::Overloaded {
                reason: OverloadReason::Draining,
            });
        }
        let prev = self.in_flight.fetch_add(1, Ordering::AcqRel);
        if prev >= self.cfg.max_inflight {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.overloaded_inflight.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::Overloaded {
                reason: OverloadReason::MaxInflightExceeded,
            });
        }
        Ok(InFlightGuard { store: self })
    }

    fn note_overload<T>(&self, result: &Result<T, CacheError>) {
        if let Err(CacheError::Overloaded {
            reason: OverloadReason::ShardMailboxFull,
        }) = result
        {
            self.overloaded_mailbox.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Coefficient of variation (sigma over mu) of entry counts; 0 when the
/// store is empty.
fn imbalance(shards: &[ShardStats]) -> f64 {
    if shards.is_empty() {
        return 0.0;
    }
    let counts: Vec<f64> = shards.iter().map(|s| s.entries as f64).collect();
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64;
    variance.sqrt() / mean
}

struct InFlightGuard<'a> {
    store: &'a Store,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
