// Package http provides response observation middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;

use crate::metrics;

use super::middleware::Middleware;

/// ObserveMiddleware counts every response by status code.
pub struct ObserveMiddleware;

impl ObserveMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ObserveMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

async fn observe(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    metrics::inc_status_code(response.status().as_u16());
    response
}

impl Middleware for ObserveMiddleware {
    fn apply(&self, router: Router) -> Router {
        router.layer(axum::middleware::from_fn(observe))
    }
}
