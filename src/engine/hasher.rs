// Package engine provides deterministic key-to-shard routing.

use xxhash_rust::xxh3::xxh3_64;

/// Maps a key to its owning shard index in `[0, shards)`.
/// Deterministic for the lifetime of the process; shard count is fixed
/// at startup, so a plain modulo over xxh3 is sufficient.
pub fn shard_of(key: &str, shards: usize) -> usize {
    debug_assert!(shards > 0);
    (xxh3_64(key.as_bytes()) % shards as u64) as usize
}
