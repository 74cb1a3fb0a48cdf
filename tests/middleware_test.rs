use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower::ServiceExt;

use movie_catalog::cache::{CacheStore, TtlCache};
use movie_catalog::middleware::{PageCache, RateLimiter, cache_page, no_store_headers, rate_limit};

fn request(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-real-ip", ip)
        .body(Body::empty())
        .unwrap()
}

fn plain_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn counting_router(store: Arc<CacheStore>, ttl: Duration) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let router = Router::new()
        .route(
            "/data",
            get(move || {
                let counter = counter.clone();
                async move {
                    let run = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    format!("handler run {}", run)
                }
            }),
        )
        .route_layer(from_fn_with_state(PageCache::new(store, ttl), cache_page));

    (router, hits)
}

#[tokio::test]
async fn requests_beyond_the_limit_are_rejected_with_429() {
    let limiter = Arc::new(RateLimiter::new(3, Duration::from_secs(60)));
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(from_fn_with_state(limiter, rate_limit));

    for _ in 0..3 {
        let response = app.clone().oneshot(request("/", "10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(request("/", "10.0.0.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // a different client is unaffected
    let response = app.clone().oneshot(request("/", "10.0.0.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cached_get_short_circuits_the_handler() {
    let store = Arc::new(CacheStore::Memory(TtlCache::new()));
    let (app, hits) = counting_router(store.clone(), Duration::from_secs(60));

    let first = app.clone().oneshot(plain_request("/data")).await.unwrap();
    let first_body = to_bytes(first.into_body(), 1024).await.unwrap();

    let second = app.clone().oneshot(plain_request("/data")).await.unwrap();
    let second_body = to_bytes(second.into_body(), 1024).await.unwrap();

    assert_eq!(first_body, second_body);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn flush_forces_the_next_request_back_to_the_handler() {
    let store = Arc::new(CacheStore::Memory(TtlCache::new()));
    let (app, hits) = counting_router(store.clone(), Duration::from_secs(60));

    app.clone().oneshot(plain_request("/data")).await.unwrap();
    app.clone().oneshot(plain_request("/data")).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    store.flush().await.unwrap();

    let response = app.clone().oneshot(plain_request("/data")).await.unwrap();
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"handler run 2");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pages_are_cached_per_query_string() {
    let store = Arc::new(CacheStore::Memory(TtlCache::new()));
    let (app, hits) = counting_router(store, Duration::from_secs(60));

    app.clone()
        .oneshot(plain_request("/data?page=1"))
        .await
        .unwrap();
    app.clone()
        .oneshot(plain_request("/data?page=2"))
        .await
        .unwrap();
    app.clone()
        .oneshot(plain_request("/data?page=1"))
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_pages_are_recomputed() {
    let store = Arc::new(CacheStore::Memory(TtlCache::new()));
    let (app, hits) = counting_router(store, Duration::from_millis(50));

    app.clone().oneshot(plain_request("/data")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    app.clone().oneshot(plain_request("/data")).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn every_response_carries_no_store_headers() {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(from_fn(no_store_headers));

    let response = app.oneshot(plain_request("/")).await.unwrap();
    let cache_control = response
        .headers()
        .get(axum::http::header::CACHE_CONTROL)
        .unwrap();
    assert!(cache_control.to_str().unwrap().contains("no-store"));
    assert_eq!(
        response.headers().get(axum::http::header::PRAGMA).unwrap(),
        "no-cache"
    );
}
