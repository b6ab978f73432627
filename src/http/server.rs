//! HTTP server implementation.

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::controller::Controller;
use crate::middleware::Middleware;

// Headroom over the largest admissible entry so batch envelopes with
// full-size items still parse; anything beyond is 413 at the framing.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Server trait for HTTP server operations.
#[async_trait::async_trait]
pub trait Server: Send + Sync {
    /// Starts the server (blocking).
    async fn listen_and_serve(&self) -> Result<()>;
}

/// HTTP server implementation.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    port: u16,
    router: Router,
}

impl HttpServer {
    /// Creates a new HTTP server from controllers and middlewares.
    pub fn new(
        shutdown_token: CancellationToken,
        config: &Config,
        controllers: Vec<Box<dyn Controller>>,
        middlewares: Vec<Box<dyn Middleware>>,
    ) -> Result<Arc<Self>> {
        let router = Self::build_router(controllers);
        let router = Self::merge_middlewares(router, middlewares, config);

        Ok(Arc::new(Self {
            shutdown_token,
            port: config.port,
            router,
        }))
    }

    /// Starts the HTTP server.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port)
            .parse()
            .context("failed to parse server address")?;

        info!(
            component = "server",
            event = "started",
            port = self.port,
            "server started"
        );

        let listener = TcpListener::bind(&addr)
            .await
            .context("failed to bind TCP listener")?;

        let shutdown_token = self.shutdown_token.clone();
        let serve_future =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                port = self.port,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            port = self.port,
            "server stopped"
        );

        Ok(())
    }

    /// Router composed for tests and for serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }
        router
    }

    /// Applies middlewares in reverse order (last wraps first), then the
    /// boundary layers: request timeout and the body limit that enforces
    /// the batch aggregate payload cap.
    fn merge_middlewares(
        router: Router,
        middlewares: Vec<Box<dyn Middleware>>,
        config: &Config,
    ) -> Router {
        let mut result = router;
        for middleware in middlewares.iter().rev() {
            result = middleware.apply(result);
        }
        result
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(config.request_timeout))
            .layer(DefaultBodyLimit::max(
                config.max_item_bytes.saturating_add(BODY_LIMIT_SLACK),
            ))
    }
}

#[async_trait::async_trait]
impl Server for HttpServer {
    async fn listen_and_serve(&self) -> Result<()> {
        HttpServer::listen_and_serve(self).await
    }
}

#[async_trait::async_trait]
impl Server for Arc<HttpServer> {
    async fn listen_and_serve(&self) -> Result<()> {
        HttpServer::listen_and_serve(self).await
    }
}
