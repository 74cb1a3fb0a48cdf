use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;

/// State for `cache_page`: which store to use and how long a captured page
/// stays fresh. One instance per route group, so listings, search results
/// and detail pages can carry different lifetimes.
#[derive(Clone)]
pub struct PageCache {
    store: Arc<CacheStore>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(store: Arc<CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[derive(Serialize, Deserialize)]
struct CachedPage {
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

impl IntoResponse for CachedPage {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = (status, self.body).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
    }
}

fn page_key(req: &Request<Body>) -> String {
    let uri = req.uri();
    match uri.path_and_query() {
        Some(path_and_query) => format!("page:{}", path_and_query),
        None => format!("page:{}", uri.path()),
    }
}

/// Serves GET responses from the page cache, capturing fresh 200 responses on
/// the way out. Store failures are logged and treated as misses.
pub async fn cache_page(
    State(pages): State<PageCache>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let key = page_key(&req);
    match pages.store.get(&key).await {
        Ok(Some(bytes)) => {
            if let Ok(page) = serde_json::from_slice::<CachedPage>(&bytes) {
                tracing::debug!("Page cache hit: {}", key);
                return page.into_response();
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!("Page cache read failed for {}: {}", key, err),
    }

    let response = next.run(req).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!("Failed to buffer response for {}: {}", key, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    let page = CachedPage {
        status: parts.status.as_u16(),
        content_type,
        body: bytes.to_vec(),
    };
    match serde_json::to_vec(&page) {
        Ok(encoded) => {
            if let Err(err) = pages.store.set(&key, encoded, pages.ttl).await {
                tracing::warn!("Page cache write failed for {}: {}", key, err);
            }
        }
        Err(err) => tracing::warn!("Page cache encode failed for {}: {}", key, err),
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Tells clients and proxies not to reuse responses; server-side freshness is
/// handled by the page cache alone.
pub async fn no_store_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(
            "no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0",
        ),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}
