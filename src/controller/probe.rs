// Package api provides health and readiness probe controllers.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::engine::Store;
use crate::http::Controller;

const HEALTHY_RESPONSE: &str = r#"{"status":"ok"}"#;
const NOT_READY_RESPONSE: &str = r#"{"status":"draining"}"#;

/// ProbeController serves `/healthz` and `/readyz`.
/// Both are unauthenticated.
pub struct ProbeController {
    store: Arc<Store>,
}

impl ProbeController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn healthz(&self) -> Response {
        (StatusCode::OK, HEALTHY_RESPONSE).into_response()
    }

    async fn readyz(&self) -> Response {
        if self.store.is_running() {
            (StatusCode::OK, HEALTHY_RESPONSE).into_response()
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, NOT_READY_RESPONSE).into_response()
        }
    }
}

impl Controller for ProbeController {
    fn add_route(&self, router: Router) -> Router {
        let health_ctl = Arc::new(self.clone());
        let ready_ctl = health_ctl.clone();
        router
            .route(
                "/healthz",
                get(move || {
                    let controller = health_ctl.clone();
                    async move { controller.healthz().await }
                }),
            )
            .route(
                "/readyz",
                get(move || {
                    let controller = ready_ctl.clone();
                    async move { controller.readyz().await }
                }),
            )
    }
}

impl Clone for ProbeController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
