//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::engine::Store;
use crate::http::Controller;
use crate::metrics;

/// PrometheusMetricsController serves the exposition text at `/metrics`.
pub struct PrometheusMetricsController {
    store: Arc<Store>,
}

impl PrometheusMetricsController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn scrape(&self) -> Response {
        let body = metrics::render(&self.store.stats());
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response()
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        router.route(
            metrics::PROMETHEUS_METRICS_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.scrape().await }
            }),
        )
    }
}

impl Clone for PrometheusMetricsController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
