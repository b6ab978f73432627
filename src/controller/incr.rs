// Package api provides the atomic increment controller.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::engine::Store;
use crate::http::Controller;
use crate::metrics;

use super::error::ApiError;
use super::wire;

#[derive(Debug, Deserialize)]
struct IncrBody {
    key: String,
    delta: i32,
}

/// IncrController handles `POST /v1/kv/incr`.
pub struct IncrController {
    store: Arc<Store>,
}

impl IncrController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn incr(&self, body: IncrBody) -> Result<Response, ApiError> {
        wire::validate_key(&body.key)?;
        metrics::observe_payload_bytes(8);
        let outcome = self
            .store
            .increment(Arc::from(body.key.as_str()), f64::from(body.delta))
            .await?;
        Ok(Json(json!({
            "key": body.key,
            "value": outcome.value,
            "version": outcome.version,
        }))
        .into_response())
    }
}

impl Controller for IncrController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        router.route(
            "/v1/kv/incr",
            post(move |payload: Result<Json<IncrBody>, JsonRejection>| {
                let controller = controller.clone();
                async move {
                    let Json(body) = payload
                        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                    controller.incr(body).await
                }
            }),
        )
    }
}

impl Clone for IncrController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
