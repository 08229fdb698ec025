//! Response composition for hit, miss and error outcomes

use crate::error::MirrorError;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mirror_cache::{mime, CacheEntry, CacheError, CacheKey};
use origin_client::{FetchedObject, OriginError};
use serde_json::{json, Value};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const CACHE_CONTROL: &str = "public, max-age=3600";

/// Status, headers and body produced for one request
#[derive(Debug)]
pub struct CacheResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CacheResponse {
    /// `HIT` or `MISS` for successful responses
    pub fn cache_status(&self) -> Option<&str> {
        self.headers.get(&X_CACHE).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for CacheResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Body::from(self.body)).into_response()
    }
}

/// Serve a stored object. Metadata supplies the content type when present.
pub fn hit(key: &CacheKey, data: Bytes, entry: Option<&CacheEntry>) -> CacheResponse {
    let content_type = entry
        .map(|e| e.content_type.as_str())
        .unwrap_or_else(|| mime::infer(key.file_name()));
    cached(HeaderValue::from_static("HIT"), content_type, data)
}

/// Serve freshly fetched bytes
pub fn miss(fetched: FetchedObject) -> CacheResponse {
    cached(
        HeaderValue::from_static("MISS"),
        &fetched.content_type,
        fetched.data,
    )
}

fn cached(cache_status: HeaderValue, content_type: &str, data: Bytes) -> CacheResponse {
    let mut headers = HeaderMap::new();
    headers.insert(X_CACHE, cache_status);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(mime::DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len() as u64));

    CacheResponse {
        status: StatusCode::OK,
        headers,
        body: data,
    }
}

/// Map a resolution failure to a JSON error response
pub fn error(err: &MirrorError, path: &str, expose_details: bool) -> CacheResponse {
    match err {
        MirrorError::Cache(CacheError::InvalidKey(msg)) => json_response(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Invalid path",
                "path": path,
                "message": msg,
            }),
        ),
        MirrorError::Origin(OriginError::Rejected {
            status,
            reason,
            url,
        }) => json_response(
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            json!({
                "error": "Failed to fetch resource",
                "status": status,
                "statusText": reason,
                "url": url,
                "path": path,
            }),
        ),
        MirrorError::Origin(OriginError::PayloadTooLarge { limit, actual }) => json_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({
                "error": "File too large",
                "maxSize": limit,
                "actualSize": actual,
                "path": path,
            }),
        ),
        other => {
            let mut body = json!({
                "error": "Internal server error",
                "path": path,
            });
            if expose_details {
                body["message"] = Value::String(other.to_string());
            }
            json_response(StatusCode::INTERNAL_SERVER_ERROR, body)
        }
    }
}

fn json_response(status: StatusCode, body: Value) -> CacheResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    CacheResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    }
}
