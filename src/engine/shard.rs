// Package engine provides the shard actor.
//
// A shard owns its entries, LRU and TTL heap. Mutations are serialized
// through a bounded mailbox drained by a single dispatcher task; reads
// bypass the mailbox and take the shared lock only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::entry::Entry;
use crate::engine::error::{CacheError, OverloadReason};
use crate::engine::lru::SizedLru;
use crate::engine::ttl::ExpiryHeap;
use crate::engine::value::{self, Value};
use crate::time;

/// Tuning for a single shard.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub mailbox_capacity: usize,
    pub max_item_bytes: usize,
    /// Byte budget for the LRU; None disables eviction by bytes.
    pub max_bytes: Option<u64>,
    pub sweep_interval: Duration,
    /// Upper bound on expire messages emitted per sweep tick.
    pub sweep_batch: usize,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            max_item_bytes: 256 * 1024 * 1024,
            max_bytes: None,
            sweep_interval: Duration::from_secs(1),
            sweep_batch: 256,
        }
    }
}

/// A set mutation as admitted by the store façade.
#[derive(Debug, Clone)]
pub struct SetRequest {
    pub key: Arc<str>,
    pub value: Value,
    pub ttl_ms: Option<i64>,
    pub if_match: Option<String>,
    pub if_none_match: bool,
}

impl SetRequest {
    pub fn new(key: impl Into<Arc<str>>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            ttl_ms: None,
            if_match: None,
            if_none_match: false,
        }
    }
}

/// Result of a successful set.
#[derive(Debug, Clone)]
pub struct SetOutcome {
    pub version: String,
    pub expires_at: Option<i64>,
    /// True when the pre-write state was absent or expired.
    pub created: bool,
}

/// Result of a successful increment.
#[derive(Debug, Clone)]
pub struct IncrOutcome {
    pub value: f64,
    pub version: String,
}

enum Command {
    Set {
        req: SetRequest,
        reply: oneshot::Sender<Result<SetOutcome, CacheError>>,
    },
    Delete {
        key: Arc<str>,
        if_match: Option<String>,
        reply: oneshot::Sender<Result<bool, CacheError>>,
    },
    Increment {
        key: Arc<str>,
        delta: f64,
        reply: oneshot::Sender<Result<IncrOutcome, CacheError>>,
    },
    /// Internal: remove the entry iff it still carries this deadline and
    /// the deadline has passed. Guards against TTL extension races.
    Expire { key: Arc<str>, expires_at: i64 },
}

/// Monotonic per-shard counters, readable without the data lock.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    conflicts: AtomicU64,
}

/// Point-in-time counter snapshot used by stats aggregation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ShardStats {
    pub id: usize,
    pub entries: u64,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub conflicts: u64,
    pub mailbox_depth: u64,
}

struct ShardData {
    entries: HashMap<Arc<str>, Entry>,
    lru: SizedLru,
    ttl: ExpiryHeap,
}

struct ShardInner {
    id: usize,
    cfg: ShardConfig,
    data: RwLock<ShardData>,
    counters: Counters,
    // Mirrors of the LRU accounting, refreshed by the dispatcher so that
    // stats never take the data lock.
    mem: AtomicU64,
    len: AtomicU64,
}

/// Handle to a spawned shard.
pub struct Shard {
    inner: Arc<ShardInner>,
    tx: mpsc::Sender<Command>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shard {
    /// Spawns the dispatcher and sweeper tasks and returns the handle.
    pub fn spawn(id: usize, cfg: ShardConfig, shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(cfg.mailbox_capacity);
        let inner = Arc::new(ShardInner {
            id,
            data: RwLock::new(ShardData {
                entries: HashMap::new(),
                lru: SizedLru::new(None, cfg.max_bytes),
                ttl: ExpiryHeap::new(),
            }),
            counters: Counters::default(),
            mem: AtomicU64::new(0),
            len: AtomicU64::new(0),
            cfg,
        });

        let dispatcher = Self::spawn_dispatcher(inner.clone(), rx, shutdown.clone());
        let sweeper = Self::spawn_sweeper(inner.clone(), tx.clone(), shutdown);

        Self {
            inner,
            tx,
            tasks: Mutex::new(vec![dispatcher, sweeper]),
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Read fast path; never traverses the mailbox.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.get(key, &self.tx)
    }

    pub async fn set(&self, req: SetRequest) -> Result<SetOutcome, CacheError> {
        self.send(|reply| Command::Set { req, reply }).await
    }

    pub async fn delete(
        &self,
        key: Arc<str>,
        if_match: Option<String>,
    ) -> Result<bool, CacheError> {
        self.send(|reply| Command::Delete {
            key,
            if_match,
            reply,
        })
        .await
    }

    pub async fn increment(&self, key: Arc<str>, delta: f64) -> Result<IncrOutcome, CacheError> {
        self.send(|reply| Command::Increment { key, delta, reply })
            .await
    }

    pub fn stats(&self) -> ShardStats {
        let inner = &self.inner;
        ShardStats {
            id: inner.id,
            entries: inner.len.load(Ordering::Relaxed),
            bytes: inner.mem.load(Ordering::Relaxed),
            hits: inner.counters.hits.load(Ordering::Relaxed),
            misses: inner.counters.misses.load(Ordering::Relaxed),
            sets: inner.counters.sets.load(Ordering::Relaxed),
            deletes: inner.counters.deletes.load(Ordering::Relaxed),
            evictions: inner.counters.evictions.load(Ordering::Relaxed),
            expirations: inner.counters.expirations.load(Ordering::Relaxed),
            conflicts: inner.counters.conflicts.load(Ordering::Relaxed),
            mailbox_depth: (self.tx.max_capacity() - self.tx.capacity()) as u64,
        }
    }

    /// Awaits dispatcher and sweeper exit. The shutdown token must be
    /// cancelled first; the dispatcher drains its queue before stopping.
    pub async fn close(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Admits one mutation into the mailbox and awaits the reply.
    /// Admission is non-blocking: a full mailbox rejects immediately.
    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, CacheError>>) -> Command,
    ) -> Result<T, CacheError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        match self.tx.try_send(make(reply_tx)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                return Err(CacheError::Overloaded {
                    reason: OverloadReason::ShardMailboxFull,
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(CacheError::Overloaded {
                    reason: OverloadReason::Draining,
                });
            }
        }
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Internal(
                "shard dispatcher dropped the reply".to_string(),
            )),
        }
    }

    fn spawn_dispatcher(
        inner: Arc<ShardInner>,
        mut rx: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            loop {
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(cmd) => inner.apply(cmd),
                        None => break,
                    },
                    _ = shutdown.cancelled() => {
                        // Draining: refuse new admissions, run the queue dry.
                        rx.close();
                        while let Some(cmd) = rx.recv().await {
                            inner.apply(cmd);
                        }
                        break;
                    }
                }
            }
            debug!(
                component = "shard",
                shard = inner.id,
                event = "dispatcher_stopped",
                "dispatcher stopped"
            );
        })
    }

    fn spawn_sweeper(
        inner: Arc<ShardInner>,
        tx: mpsc::Sender<Command>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(inner.cfg.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => inner.sweep(&tx),
                    _ = shutdown.cancelled() => break,
                }
            }
            debug!(
                component = "shard",
                shard = inner.id,
                event = "sweeper_stopped",
                "sweeper stopped"
            );
        })
    }
}

impl ShardInner {
    /// Read fast path. Expired entries are tombstones: the reader reports
    /// a miss and routes the removal through the mailbox, so the
    /// dispatcher stays the only writer and re-checks before deleting.
    fn get(&self, key: &str, tx: &mpsc::Sender<Command>) -> Option<Entry> {
        let now = time::now_ms();
        let entry = {
            let data = self.data.read();
            data.entries.get(key).cloned()
        };
        let entry = match entry {
            Some(entry) => entry,
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if entry.is_expired(now) {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            if let Some(at) = entry.expires_at {
                let _ = tx.try_send(Command::Expire {
                    key: entry.key.clone(),
                    expires_at: at,
                });
            }
            return None;
        }
        // Best-effort promotion; skipping under write contention only
        // leaves the access order slightly stale.
        if let Some(mut data) = self.data.try_write() {
            data.lru.touch(key);
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry)
    }

    fn apply(&self, cmd: Command) {
        match cmd {
            Command::Set { req, reply } => {
                let _ = reply.send(self.apply_set(req));
            }
            Command::Delete {
                key,
                if_match,
                reply,
            } => {
                let _ = reply.send(self.apply_delete(key, if_match));
            }
            Command::Increment { key, delta, reply } => {
                let _ = reply.send(self.apply_increment(key, delta));
            }
            Command::Expire { key, expires_at } => self.apply_expire(key, expires_at),
        }
    }

    fn apply_set(&self, req: SetRequest) -> Result<SetOutcome, CacheError> {
        let size = req.value.size_bytes();
        if size > self.cfg.max_item_bytes {
            return Err(CacheError::PayloadTooLarge {
                size,
                limit: self.cfg.max_item_bytes,
            });
        }

        let now = time::now_ms();
        let mut data = self.data.write();

        // An entry past its deadline is absent for CAS purposes.
        let live = data
            .entries
            .get(req.key.as_ref())
            .filter(|e| !e.is_expired(now))
            .map(|e| (e.version.clone(), e.created_at));

        if req.if_none_match {
            if let Some((actual, _)) = &live {
                self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                return Err(CacheError::Conflict {
                    key: req.key.to_string(),
                    expected: None,
                    actual: Some(actual.clone()),
                });
            }
        }
        if let Some(expected) = &req.if_match {
            match &live {
                None => {
                    self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                    return Err(CacheError::Conflict {
                        key: req.key.to_string(),
                        expected: Some(expected.clone()),
                        actual: None,
                    });
                }
                Some((actual, _)) if actual != expected => {
                    self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                    return Err(CacheError::Conflict {
                        key: req.key.to_string(),
                        expected: Some(expected.clone()),
                        actual: Some(actual.clone()),
                    });
                }
                Some(_) => {}
            }
        }

        let created = live.is_none();
        let created_at = live.map(|(_, at)| at).unwrap_or(now);
        let expires_at = req.ttl_ms.map(|ttl| now + ttl);
        let version = value::mint_version(now);

        let entry = Entry {
            key: req.key.clone(),
            value: req.value,
            version: version.clone(),
            created_at,
            updated_at: now,
            expires_at,
            size_bytes: size,
        };
        data.entries.insert(req.key.clone(), entry);
        for victim in data.lru.put(req.key.clone(), size as u64) {
            data.entries.remove(victim.as_ref());
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(at) = expires_at {
            data.ttl.push(req.key.clone(), at);
        }
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        self.sync_mirrors(&data);

        Ok(SetOutcome {
            version,
            expires_at,
            created,
        })
    }

    fn apply_delete(&self, key: Arc<str>, if_match: Option<String>) -> Result<bool, CacheError> {
        let now = time::now_ms();
        let mut data = self.data.write();

        let state = data
            .entries
            .get(key.as_ref())
            .map(|e| (e.is_expired(now), e.version.clone()));
        match state {
            None => Ok(false),
            Some((true, _)) => {
                // Drop the tombstone while we hold the lock.
                Self::remove_entry(&mut data, key.as_ref());
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                self.sync_mirrors(&data);
                Ok(false)
            }
            Some((false, version)) => {
                if let Some(expected) = if_match {
                    if version != expected {
                        self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                        return Err(CacheError::Conflict {
                            key: key.to_string(),
                            expected: Some(expected),
                            actual: Some(version),
                        });
                    }
                }
                Self::remove_entry(&mut data, key.as_ref());
                self.counters.deletes.fetch_add(1, Ordering::Relaxed);
                self.sync_mirrors(&data);
                Ok(true)
            }
        }
    }

    fn apply_increment(&self, key: Arc<str>, delta: f64) -> Result<IncrOutcome, CacheError> {
        let now = time::now_ms();
        let mut data = self.data.write();

        let expired = matches!(data.entries.get(key.as_ref()), Some(e) if e.is_expired(now));
        if expired {
            Self::remove_entry(&mut data, key.as_ref());
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        }

        let current = data.entries.get(key.as_ref());
        if let Some(entry) = current {
            if entry.value.as_number().is_none() {
                return Err(CacheError::BadRequest(format!(
                    "increment requires a number value, key holds {}",
                    entry.kind().as_str()
                )));
            }
        }

        let base = current.and_then(|e| e.value.as_number()).unwrap_or(0.0);
        let created_at = current.map(|e| e.created_at).unwrap_or(now);
        // The TTL window is preserved; changing it takes a set.
        let expires_at = current.and_then(|e| e.expires_at);

        let next = base + delta;
        let version = value::mint_version(now);
        let entry = Entry {
            key: key.clone(),
            value: Value::Number(next),
            version: version.clone(),
            created_at,
            updated_at: now,
            expires_at,
            size_bytes: 8,
        };
        data.entries.insert(key.clone(), entry);
        // Re-charging through the LRU corrects the byte accounting when
        // the previous value was a larger non-number.
        for victim in data.lru.put(key.clone(), 8) {
            data.entries.remove(victim.as_ref());
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        self.sync_mirrors(&data);

        Ok(IncrOutcome {
            value: next,
            version,
        })
    }

    fn apply_expire(&self, key: Arc<str>, recorded: i64) {
        let now = time::now_ms();
        let mut data = self.data.write();
        let ripe = matches!(
            data.entries.get(key.as_ref()),
            Some(e) if e.expires_at == Some(recorded) && recorded <= now
        );
        if ripe {
            Self::remove_entry(&mut data, key.as_ref());
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            self.sync_mirrors(&data);
        }
    }

    /// One sweep tick: pop due heap records, discard stale ones, enqueue
    /// expire mutations for the rest. Never mutates entries directly.
    fn sweep(&self, tx: &mpsc::Sender<Command>) {
        let now = time::now_ms();
        let due = {
            let mut data = self.data.write();
            data.ttl.pop_expired(now, self.cfg.sweep_batch)
        };
        if due.is_empty() {
            return;
        }

        let mut requeue = Vec::new();
        {
            let data = self.data.read();
            for rec in due {
                let live = matches!(
                    data.entries.get(rec.key.as_ref()),
                    Some(e) if e.expires_at == Some(rec.expires_at)
                );
                if !live {
                    continue;
                }
                if tx
                    .try_send(Command::Expire {
                        key: rec.key.clone(),
                        expires_at: rec.expires_at,
                    })
                    .is_err()
                {
                    requeue.push(rec);
                }
            }
        }
        // Records that did not fit the mailbox go back on the heap so the
        // entry-implies-record invariant holds for the next tick.
        if !requeue.is_empty() {
            let mut data = self.data.write();
            for rec in requeue {
                data.ttl.push(rec.key, rec.expires_at);
            }
        }
    }

    fn remove_entry(data: &mut ShardData, key: &str) {
        data.entries.remove(key);
        data.lru.remove(key);
    }

    fn sync_mirrors(&self, data: &ShardData) {
        self.mem.store(data.lru.bytes(), Ordering::Relaxed);
        self.len.store(data.lru.len() as u64, Ordering::Relaxed);
    }
}
