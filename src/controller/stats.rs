// Package api provides the JSON stats controller.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::engine::Store;
use crate::http::Controller;

/// StatsController serves per-shard counters, totals and the imbalance
/// metric as JSON at `/v1/stats`.
pub struct StatsController {
    store: Arc<Store>,
}

impl StatsController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn stats(&self) -> Response {
        Json(self.store.stats()).into_response()
    }
}

impl Controller for StatsController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        router.route(
            "/v1/stats",
            get(move || {
                let controller = controller.clone();
                async move { controller.stats().await }
            }),
        )
    }
}

impl Clone for StatsController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
