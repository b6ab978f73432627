// Package api provides the batch KV controller.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::engine::{CacheError, SetRequest, Store};
use crate::http::Controller;
use crate::metrics;
use crate::time;

use super::error::ApiError;
use super::wire::{self, EntryResponse, SetBody};

#[derive(Debug, Deserialize)]
struct BatchKeys {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchSetBody {
    items: Vec<BatchSetItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchSetItem {
    key: String,
    value: JsonValue,
    ttl_sec: Option<u64>,
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchItemResult {
    key: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonValue>,
}

fn wire_error(err: &CacheError) -> JsonValue {
    json!({"code": err.code(), "message": err.to_string()})
}

/// BatchController handles `POST /v1/kv/batch/{get,set,delete}`.
pub struct BatchController {
    store: Arc<Store>,
}

impl BatchController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn batch_get(&self, body: BatchKeys) -> Result<Response, ApiError> {
        wire::validate_batch_len(body.keys.len())?;
        let mut keys = Vec::with_capacity(body.keys.len());
        for key in &body.keys {
            wire::validate_key(key)?;
            keys.push(Arc::<str>::from(key.as_str()));
        }

        let result = self.store.batch_get(&keys)?;
        let now = time::now_ms();
        let hits: Vec<EntryResponse> = result
            .hits
            .iter()
            .map(|entry| EntryResponse::from_entry(entry, false, now))
            .collect();
        let misses: Vec<&str> = result.misses.iter().map(AsRef::as_ref).collect();
        Ok(Json(json!({"hits": hits, "misses": misses})).into_response())
    }

    async fn batch_set(&self, body: BatchSetBody) -> Result<Response, ApiError> {
        wire::validate_batch_len(body.items.len())?;
        let mut requests: Vec<SetRequest> = Vec::with_capacity(body.items.len());
        for item in body.items {
            let req = wire::build_set(
                &item.key,
                SetBody {
                    value: item.value,
                    ttl_sec: item.ttl_sec,
                    encoding: item.encoding,
                },
                None,
                false,
            )?;
            metrics::observe_payload_bytes(req.value.size_bytes() as u64);
            requests.push(req);
        }

        let results = self.store.batch_set(requests).await?;
        let wire_results: Vec<BatchItemResult> = results
            .into_iter()
            .map(|item| match item.result {
                Ok(outcome) => BatchItemResult {
                    key: item.key.to_string(),
                    status: if outcome.created { "created" } else { "updated" },
                    version: Some(outcome.version),
                    error: None,
                },
                Err(err) => BatchItemResult {
                    key: item.key.to_string(),
                    status: "error",
                    version: None,
                    error: Some(wire_error(&err)),
                },
            })
            .collect();
        Ok(Json(json!({ "results": wire_results })).into_response())
    }

    async fn batch_delete(&self, body: BatchKeys) -> Result<Response, ApiError> {
        wire::validate_batch_len(body.keys.len())?;
        let mut keys = Vec::with_capacity(body.keys.len());
        for key in &body.keys {
            wire::validate_key(key)?;
            keys.push(Arc::<str>::from(key.as_str()));
        }

        let results = self.store.batch_delete(keys).await?;
        let wire_results: Vec<BatchItemResult> = results
            .into_iter()
            .map(|item| match item.result {
                Ok(true) => BatchItemResult {
                    key: item.key.to_string(),
                    status: "deleted",
                    version: None,
                    error: None,
                },
                Ok(false) => BatchItemResult {
                    key: item.key.to_string(),
                    status: "missing",
                    version: None,
                    error: None,
                },
                Err(err) => BatchItemResult {
                    key: item.key.to_string(),
                    status: "error",
                    version: None,
                    error: Some(wire_error(&err)),
                },
            })
            .collect();
        Ok(Json(json!({ "results": wire_results })).into_response())
    }
}

impl Controller for BatchController {
    fn add_route(&self, router: Router) -> Router {
        let get_ctl = Arc::new(self.clone());
        let set_ctl = get_ctl.clone();
        let delete_ctl = get_ctl.clone();

        router
            .route(
                "/v1/kv/batch/get",
                post(move |payload: Result<Json<BatchKeys>, JsonRejection>| {
                    let controller = get_ctl.clone();
                    async move {
                        let Json(body) = payload
                            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                        controller.batch_get(body).await
                    }
                }),
            )
            .route(
                "/v1/kv/batch/set",
                post(move |payload: Result<Json<BatchSetBody>, JsonRejection>| {
                    let controller = set_ctl.clone();
                    async move {
                        let Json(body) = payload
                            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                        controller.batch_set(body).await
                    }
                }),
            )
            .route(
                "/v1/kv/batch/delete",
                post(move |payload: Result<Json<BatchKeys>, JsonRejection>| {
                    let controller = delete_ctl.clone();
                    async move {
                        let Json(body) = payload
                            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                        controller.batch_delete(body).await
                    }
                }),
            )
    }
}

impl Clone for BatchController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
