//! Response cache middleware for the home page.
//!
//! Caches GET responses and serves them back byte-for-byte until the TTL
//! elapses. Whichever request arrives first after expiry regenerates the
//! entry; concurrent regenerations are tolerated.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument};

use super::{
    CacheConfig,
    keys::{ResponseKey, hash_cookie_header, hash_query},
    store::{CachedResponse, ResponseStore},
};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(ResponseStore::new(&config));
        Self { config, store }
    }
}

/// Middleware caching successful GET responses, varied by cookie.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled {
        return next.run(request).await;
    }

    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = ResponseKey {
        path: request.uri().path().to_string(),
        query_hash: hash_query(request.uri().query().unwrap_or("")),
        cookie_hash: hash_cookie_header(request.headers()),
    };

    if let Some(cached) = cache.store.get(&key) {
        counter!("yatube_cache_hit_total").increment(1);
        debug!(cache = "response", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!("yatube_cache_miss_total").increment(1);
    debug!(
        cache = "response",
        outcome = "miss",
        "cache miss, executing handler"
    );

    let response = next.run(request).await;

    // Only successful page renders are worth replaying.
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|text| (name.to_string(), text.to_string()))
            })
            .collect(),
        body: bytes.clone(),
    };

    cache.store.set(key, cached);

    Response::from_parts(parts, Body::from(bytes))
}

/// Build a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    use axum::http::HeaderValue;

    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
