// Package http provides shared-token authentication middleware.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::debug;

use crate::controller::ApiError;
use crate::metrics;

use super::middleware::Middleware;

pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Token policy: writes always require the token, reads only when
/// configured. Probes and the scrape endpoint are exempt.
#[derive(Debug)]
pub struct AuthPolicy {
    pub token: String,
    pub read_requires_auth: bool,
}

/// AuthMiddleware enforces the `X-API-Token` policy.
pub struct AuthMiddleware {
    policy: Arc<AuthPolicy>,
}

impl AuthMiddleware {
    pub fn new(token: String, read_requires_auth: bool) -> Self {
        Self {
            policy: Arc::new(AuthPolicy {
                token,
                read_requires_auth,
            }),
        }
    }
}

fn is_exempt(path: &str) -> bool {
    matches!(path, "/healthz" | "/readyz" | "/metrics")
}

/// Reads are `GET` routes plus the batch read, which travels as a POST.
fn is_read(method: &Method, path: &str) -> bool {
    *method == Method::GET || path == "/v1/kv/batch/get"
}

async fn authenticate(policy: Arc<AuthPolicy>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_exempt(&path) {
        return next.run(request).await;
    }
    if is_read(request.method(), &path) && !policy.read_requires_auth {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|raw| raw.to_str().ok())
        .map(|token| token == policy.token)
        .unwrap_or(false);
    if authorized {
        return next.run(request).await;
    }

    metrics::inc_auth_failures();
    debug!(
        component = "auth",
        event = "token_rejected",
        path = %path,
        "request refused"
    );
    ApiError::unauthorized().into_response()
}

impl Middleware for AuthMiddleware {
    fn apply(&self, router: Router) -> Router {
        let policy = self.policy.clone();
        router.layer(axum::middleware::from_fn(
            move |request: Request, next: Next| {
                let policy = policy.clone();
                async move { authenticate(policy, request, next).await }
            },
        ))
    }
}
