// HTTP server composition for the cache application.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::controller;
use crate::engine::Store;
use crate::http::{Controller, HttpServer, Middleware};
use crate::middleware;

/// Builds the HTTP server with all controllers and middlewares.
pub fn make_http_server(
    ctx: CancellationToken,
    cfg: &Config,
    store: Arc<Store>,
) -> Result<Arc<HttpServer>> {
    HttpServer::new(ctx, cfg, controllers(cfg, store), middlewares(cfg))
}

/// All HTTP controllers, one per route group.
fn controllers(_cfg: &Config, store: Arc<Store>) -> Vec<Box<dyn Controller>> {
    vec![
        // Health and readiness probes
        Box::new(controller::ProbeController::new(store.clone())),
        // Prometheus scrape endpoint
        Box::new(controller::PrometheusMetricsController::new(store.clone())),
        // Single-key reads and writes
        Box::new(controller::KvController::new(store.clone())),
        // Batch fan-out
        Box::new(controller::BatchController::new(store.clone())),
        // Atomic increment
        Box::new(controller::IncrController::new(store.clone())),
        // Aggregated stats as JSON
        Box::new(controller::StatsController::new(store)),
    ]
}

/// Request middlewares, outermost first.
fn middlewares(cfg: &Config) -> Vec<Box<dyn Middleware>> {
    vec![
        // Exec first - panic recovery
        Box::new(middleware::RecoverMiddleware::new()),
        // Response status accounting
        Box::new(middleware::ObserveMiddleware::new()),
        // Token check
        Box::new(middleware::AuthMiddleware::new(
            cfg.api_token.clone(),
            cfg.read_requires_auth,
        )),
    ]
}
