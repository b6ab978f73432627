// Package http provides panic recovery middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::error;

use crate::controller::ApiError;
use crate::engine::CacheError;
use crate::metrics;

use super::middleware::Middleware;

/// RecoverMiddleware turns handler panics into 500 responses so a single
/// bad request cannot take the worker down.
pub struct RecoverMiddleware;

impl RecoverMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RecoverMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

async fn recover(request: Request, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic_info) => {
            metrics::inc_panics();

            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                format!("panic: {s}")
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                format!("panic: {s}")
            } else {
                "panic: unknown".to_string()
            };
            error!(
                component = "http",
                event = "panic_recovered",
                error = %panic_msg,
                "panic recovered in HTTP handler"
            );

            ApiError(CacheError::Internal("internal server error".to_string())).into_response()
        }
    }
}

impl Middleware for RecoverMiddleware {
    fn apply(&self, router: Router) -> Router {
        router.layer(axum::middleware::from_fn(recover))
    }
}
