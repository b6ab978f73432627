// Main entrypoint for the kvcache node.

mod app;
mod config;
mod controller;
mod engine;
mod http;
mod metrics;
mod middleware;
mod shutdown;
#[path = "shared/time/mod.rs"]
mod time;

use crate::config::Config;
use crate::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// kvcache - sharded in-process key-value cache with an HTTP/JSON surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the PORT environment variable
    #[arg(short, long)]
    port: Option<u16>,
}

/// Configures structured logging from the loaded configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone()));

    if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // Cancellation token shared by every component.
    let shutdown_token = CancellationToken::new();

    // Start the cached millisecond clock.
    let _clock_token = time::start(Duration::from_millis(1));

    let mut cfg = Config::from_env().context("failed to load configuration")?;
    if let Some(port) = args.port {
        cfg.port = port;
    }

    configure_logger(&cfg);

    info!(
        component = "main",
        event = "configured",
        port = cfg.port,
        shards = cfg.shards,
        max_inflight = cfg.max_inflight,
        "configuration loaded"
    );

    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone(), Duration::from_secs(30));

    let app = app::App::new(shutdown_token.clone(), cfg)?;

    // Register the app and serve it in the background.
    graceful_shutdown.add(1);
    let graceful_done = Arc::new(graceful_shutdown.clone());
    let app_clone = app.clone();
    tokio::task::spawn(async move {
        if let Err(e) = app_clone.serve(graceful_done).await {
            error!(
                component = "main",
                scope = "app",
                event = "start_failed",
                error = %e,
                "failed to start app"
            );
        }
    });

    // Listen for OS signals or cancellation and drain.
    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
