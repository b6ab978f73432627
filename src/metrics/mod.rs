//! Metrics registry: atomic counters plus Prometheus text rendering.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::engine::StoreStats;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

// Boundary counters.
static AUTH_FAILURES: AtomicU64 = AtomicU64::new(0);
static PANICS: AtomicU64 = AtomicU64::new(0);

// Status code counters (0-599).
static STATUS_CODE_COUNTERS: OnceLock<Vec<AtomicU64>> = OnceLock::new();

// Payload size histogram. Bucket upper bounds in bytes; counts are
// per-bucket and cumulated at render time.
const PAYLOAD_BUCKETS: &[u64] = &[
    256,
    1_024,
    4_096,
    16_384,
    65_536,
    262_144,
    1_048_576,
    4_194_304,
    16_777_216,
    67_108_864,
    268_435_456,
];
static PAYLOAD_BUCKET_COUNTS: OnceLock<Vec<AtomicU64>> = OnceLock::new();
static PAYLOAD_SUM: AtomicU64 = AtomicU64::new(0);
static PAYLOAD_COUNT: AtomicU64 = AtomicU64::new(0);

fn status_code_counters() -> &'static Vec<AtomicU64> {
    STATUS_CODE_COUNTERS.get_or_init(|| (0..600).map(|_| AtomicU64::new(0)).collect())
}

fn payload_bucket_counts() -> &'static Vec<AtomicU64> {
    // One extra slot for the +Inf bucket.
    PAYLOAD_BUCKET_COUNTS.get_or_init(|| {
        (0..=PAYLOAD_BUCKETS.len())
            .map(|_| AtomicU64::new(0))
            .collect()
    })
}

/// Increments the auth failure counter.
pub fn inc_auth_failures() {
    AUTH_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn auth_failures() -> u64 {
    AUTH_FAILURES.load(Ordering::Relaxed)
}

/// Increments the recovered-panic counter.
pub fn inc_panics() {
    PANICS.fetch_add(1, Ordering::Relaxed);
}

/// Increments the counter for an HTTP response status code.
pub fn inc_status_code(code: u16) {
    if let Some(counter) = status_code_counters().get(code as usize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Records one admitted payload size.
pub fn observe_payload_bytes(size: u64) {
    let idx = PAYLOAD_BUCKETS
        .iter()
        .position(|&bound| size <= bound)
        .unwrap_or(PAYLOAD_BUCKETS.len());
    payload_bucket_counts()[idx].fetch_add(1, Ordering::Relaxed);
    PAYLOAD_SUM.fetch_add(size, Ordering::Relaxed);
    PAYLOAD_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Renders the Prometheus exposition text from the boundary counters and
/// an engine stats snapshot.
pub fn render(stats: &StoreStats) -> String {
    let mut out = String::with_capacity(4096);

    counter(&mut out, "cache_hits_total", "Cache read hits.", stats.hits);
    counter(&mut out, "cache_misses_total", "Cache read misses.", stats.misses);
    counter(&mut out, "cache_sets_total", "Successful set and increment mutations.", stats.sets);
    counter(&mut out, "cache_deletes_total", "Successful deletes.", stats.deletes);
    counter(&mut out, "cache_evictions_total", "Entries evicted by the LRU.", stats.evictions);
    counter(&mut out, "cache_expirations_total", "Entries removed by TTL expiry.", stats.expirations);
    counter(&mut out, "cache_cas_conflicts_total", "CAS precondition failures.", stats.conflicts);

    gauge(&mut out, "cache_entries_total", "Live entries across all shards.", stats.entries);
    gauge(&mut out, "cache_bytes_total", "Bytes charged across all shards.", stats.bytes);
    gauge(&mut out, "cache_inflight", "Public calls currently in flight.", stats.in_flight);

    let _ = writeln!(
        out,
        "# HELP cache_shard_imbalance Coefficient of variation of entry counts across shards."
    );
    let _ = writeln!(out, "# TYPE cache_shard_imbalance gauge");
    let _ = writeln!(out, "cache_shard_imbalance {}", stats.imbalance);

    let _ = writeln!(
        out,
        "# HELP cache_backpressure_total Admissions refused by load shedding."
    );
    let _ = writeln!(out, "# TYPE cache_backpressure_total counter");
    let _ = writeln!(
        out,
        "cache_backpressure_total{{reason=\"max_inflight_exceeded\"}} {}",
        stats.overloaded_inflight
    );
    let _ = writeln!(
        out,
        "cache_backpressure_total{{reason=\"shard_mailbox_full\"}} {}",
        stats.overloaded_mailbox
    );

    let _ = writeln!(out, "# HELP cache_shard_entries Live entries per shard.");
    let _ = writeln!(out, "# TYPE cache_shard_entries gauge");
    for shard in &stats.shards {
        let _ = writeln!(out, "cache_shard_entries{{shard=\"{}\"}} {}", shard.id, shard.entries);
    }
    let _ = writeln!(out, "# HELP cache_shard_mailbox_depth Pending mutations per shard.");
    let _ = writeln!(out, "# TYPE cache_shard_mailbox_depth gauge");
    for shard in &stats.shards {
        let _ = writeln!(
            out,
            "cache_shard_mailbox_depth{{shard=\"{}\"}} {}",
            shard.id, shard.mailbox_depth
        );
    }

    counter(
        &mut out,
        "cache_auth_failures_total",
        "Requests refused for a missing or invalid token.",
        AUTH_FAILURES.load(Ordering::Relaxed),
    );
    counter(
        &mut out,
        "http_panics_recovered_total",
        "Panics recovered in HTTP handlers.",
        PANICS.load(Ordering::Relaxed),
    );

    let _ = writeln!(out, "# HELP http_requests_total HTTP responses by status code.");
    let _ = writeln!(out, "# TYPE http_requests_total counter");
    for (code, counter) in status_code_counters().iter().enumerate() {
        let value = counter.load(Ordering::Relaxed);
        if value > 0 {
            let _ = writeln!(out, "http_requests_total{{code=\"{code}\"}} {value}");
        }
    }

    let _ = writeln!(out, "# HELP cache_payload_bytes Admitted payload sizes.");
    let _ = writeln!(out, "# TYPE cache_payload_bytes histogram");
    let mut cumulative = 0u64;
    let bucket_counts = payload_bucket_counts();
    for (idx, bound) in PAYLOAD_BUCKETS.iter().enumerate() {
        cumulative += bucket_counts[idx].load(Ordering::Relaxed);
        let _ = writeln!(out, "cache_payload_bytes_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += bucket_counts[PAYLOAD_BUCKETS.len()].load(Ordering::Relaxed);
    let _ = writeln!(out, "cache_payload_bytes_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(out, "cache_payload_bytes_sum {}", PAYLOAD_SUM.load(Ordering::Relaxed));
    let _ = writeln!(out, "cache_payload_bytes_count {}", PAYLOAD_COUNT.load(Ordering::Relaxed));

    out
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}
