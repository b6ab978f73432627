// Main cache application implementation.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::engine::Store;
use crate::http::HttpServer;
use crate::shutdown::GracefulShutdown;

use super::server::make_http_server;

/// Encapsulates the entire cache application state.
#[derive(Clone)]
pub struct App {
    shutdown_token: CancellationToken,
    store: Arc<Store>,
    server: Arc<HttpServer>,
}

impl App {
    /// Creates a new cache application instance.
    pub fn new(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let store = Store::new(cfg.engine(), shutdown_token.clone());
        let server = make_http_server(shutdown_token.clone(), &cfg, store.clone())?;

        Ok(Self {
            shutdown_token,
            store,
            server,
        })
    }

    /// Serves the cache server and handles graceful shutdown.
    pub async fn serve(&self, gsh: Arc<GracefulShutdown>) -> Result<()> {
        let server = self.server.clone();
        let app_for_close = self.clone();

        tokio::task::spawn(async move {
            if let Err(e) = server.listen_and_serve().await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
            }

            if let Err(e) = app_for_close.close().await {
                error!(
                    component = "app",
                    scope = "shutdown",
                    event = "close_failed",
                    error = %e,
                    "application close failed"
                );
            }

            gsh.done();
        });

        info!(component = "app", event = "started", "application lifecycle");

        Ok(())
    }

    /// Drains the store and cancels the application context.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await;
        self.shutdown_token.cancel();

        info!(component = "app", event = "stopped", "application lifecycle");

        Ok(())
    }
}
