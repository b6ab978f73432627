// Package api provides the single-key KV controller.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::engine::Store;
use crate::http::Controller;
use crate::metrics;
use crate::time;

use super::error::ApiError;
use super::wire::{self, EntryResponse, SetBody};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetQuery {
    include_meta: Option<bool>,
}

/// KvController handles `PUT`/`GET`/`DELETE /v1/kv/{key}`.
pub struct KvController {
    store: Arc<Store>,
}

impl KvController {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn put(
        &self,
        key: String,
        headers: HeaderMap,
        body: SetBody,
    ) -> Result<Response, ApiError> {
        let (if_match, if_none_match) = wire::preconditions(&headers)?;
        let req = wire::build_set(&key, body, if_match, if_none_match)?;
        metrics::observe_payload_bytes(req.value.size_bytes() as u64);

        let outcome = self.store.set(req).await?;
        let status = if outcome.created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        let mut reply = json!({"key": key, "version": outcome.version});
        if let Some(at) = outcome.expires_at {
            reply["expiresAt"] = json!(at);
        }
        Ok((status, Json(reply)).into_response())
    }

    async fn get(&self, key: String, query: GetQuery) -> Result<Response, ApiError> {
        wire::validate_key(&key)?;
        let entry = self.store.get(&key)?.ok_or_else(ApiError::not_found)?;
        let include_meta = query.include_meta.unwrap_or(false);
        let reply = EntryResponse::from_entry(&entry, include_meta, time::now_ms());
        Ok(Json(reply).into_response())
    }

    async fn delete(&self, key: String, headers: HeaderMap) -> Result<Response, ApiError> {
        wire::validate_key(&key)?;
        let (if_match, _) = wire::preconditions(&headers)?;
        let deleted = self
            .store
            .delete(Arc::from(key.as_str()), if_match)
            .await?;
        if deleted {
            Ok(StatusCode::NO_CONTENT.into_response())
        } else {
            Err(ApiError::not_found())
        }
    }
}

impl Controller for KvController {
    fn add_route(&self, router: Router) -> Router {
        let put_ctl = Arc::new(self.clone());
        let get_ctl = put_ctl.clone();
        let delete_ctl = put_ctl.clone();

        router.route(
            "/v1/kv/:key",
            put(
                move |Path(key): Path<String>,
                      headers: HeaderMap,
                      payload: Result<Json<SetBody>, JsonRejection>| {
                    let controller = put_ctl.clone();
                    async move {
                        let Json(body) = payload
                            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                        controller.put(key, headers, body).await
                    }
                },
            )
            .get(
                move |Path(key): Path<String>,
                      query: Result<Query<GetQuery>, QueryRejection>| {
                    let controller = get_ctl.clone();
                    async move {
                        let Query(query) = query
                            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
                        controller.get(key, query).await
                    }
                },
            )
            .delete(move |Path(key): Path<String>, headers: HeaderMap| {
                let controller = delete_ctl.clone();
                async move { controller.delete(key, headers).await }
            }),
        )
    }
}

impl Clone for KvController {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
