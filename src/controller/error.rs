// Package api provides the wire-side error mapping.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::engine::CacheError;

/// Wire wrapper mapping the engine taxonomy onto HTTP status codes and
/// the `{"error": {code, message, details?}}` body.
#[derive(Debug)]
pub struct ApiError(pub CacheError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(CacheError::BadRequest(message.into()))
    }

    pub fn unauthorized() -> Self {
        Self(CacheError::Unauthorized)
    }

    pub fn not_found() -> Self {
        Self(CacheError::NotFound)
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CacheError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Unauthorized => StatusCode::UNAUTHORIZED,
            CacheError::NotFound => StatusCode::NOT_FOUND,
            CacheError::Conflict { .. } => StatusCode::CONFLICT,
            CacheError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
        });
        let details = match &self.0 {
            CacheError::Conflict {
                key,
                expected,
                actual,
            } => Some(json!({"key": key, "expected": expected, "actual": actual})),
            CacheError::PayloadTooLarge { size, limit } => {
                Some(json!({"size": size, "limit": limit}))
            }
            CacheError::Overloaded { reason } => Some(json!({"reason": reason.as_str()})),
            _ => None,
        };
        if let Some(details) = details {
            error["details"] = details;
        }

        let mut response = (self.status(), Json(json!({ "error": error }))).into_response();
        if matches!(self.0, CacheError::Overloaded { .. }) {
            // Shed load towards other replicas immediately.
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("0"));
        }
        response
    }
}
