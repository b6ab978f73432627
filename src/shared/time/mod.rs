//! Cached millisecond clock to avoid syscalls on hot paths.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;

static NOW_MS: AtomicI64 = AtomicI64::new(0);

fn system_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

/// Starts the clock ticker at the given resolution.
/// Call once at startup; returns a token that stops the ticker.
pub fn start(resolution: Duration) -> CancellationToken {
    NOW_MS.store(system_now_ms(), Ordering::Relaxed);

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(resolution);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    NOW_MS.store(system_now_ms(), Ordering::Relaxed);
                }
                _ = token_clone.cancelled() => {
                    break;
                }
            }
        }
    });

    token
}

/// Returns the current wall-clock time in Unix milliseconds.
/// Reads the system clock directly until the ticker has started.
pub fn now_ms() -> i64 {
    let cached = NOW_MS.load(Ordering::Relaxed);
    if cached != 0 {
        cached
    } else {
        system_now_ms()
    }
}
