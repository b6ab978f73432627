// Package shutdown provides graceful shutdown functionality.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Graceful shutdown handler: a wait-group over a semaphore plus an OS
/// signal listener with a bounded drain timeout.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Duration,
    registered: Arc<AtomicUsize>,
    done: Arc<tokio::sync::Semaphore>,
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken, timeout: Duration) -> Self {
        Self {
            shutdown_token,
            timeout,
            registered: Arc::new(AtomicUsize::new(0)),
            done: Arc::new(tokio::sync::Semaphore::new(0)),
        }
    }

    /// Registers n tasks to wait for.
    pub fn add(&self, n: usize) {
        self.registered.fetch_add(n, Ordering::SeqCst);
    }

    /// Marks one registered task as done.
    pub fn done(&self) {
        self.done.add_permits(1);
    }

    /// Waits for an OS signal or cancellation, then waits for all
    /// registered tasks to finish within the drain timeout.
    pub async fn await_shutdown(&self) -> Result<()> {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
        }

        self.shutdown_token.cancel();

        match timeout(self.timeout, self.wait_for_completion()).await {
            Ok(_) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout_secs = self.timeout.as_secs(),
                    "not all tasks were closed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }

    /// Waits until every registered task has called done().
    async fn wait_for_completion(&self) {
        let registered = self.registered.load(Ordering::SeqCst) as u32;
        if registered == 0 {
            return;
        }
        let _permits = self.done.acquire_many(registered).await;
    }
}
