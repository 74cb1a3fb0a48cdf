use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use movie_catalog::{
    AppState,
    cache::CacheStore,
    config::Config,
    database,
    middleware::{PageCache, RateLimiter, cache_page, log_errors, no_store_headers, rate_limit},
    routes,
    tmdb::TmdbClient,
    version,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Page-cache lifetimes per route group. Local listings turn over faster than
// TMDB detail lookups, which barely change.
const MOVIE_LIST_TTL: Duration = Duration::from_secs(120);
const MOVIE_SEARCH_TTL: Duration = Duration::from_secs(60);
const MOVIE_DETAIL_TTL: Duration = Duration::from_secs(300);
const TMDB_SEARCH_TTL: Duration = Duration::from_secs(60);
const TMDB_DETAIL_TTL: Duration = Duration::from_secs(3600);

// Leaves room above the image size limit for the multipart framing.
const UPLOAD_BODY_LIMIT: usize = routes::image::MAX_IMAGE_BYTES + 1024 * 1024;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = database::connect(&config)
        .await
        .expect("Failed to connect to Postgres");
    database::migrate(&pool)
        .await
        .expect("Failed to migrate database");

    let store = Arc::new(CacheStore::from_config(&config));
    let tmdb = Arc::new(TmdbClient::new(&config));

    let state = AppState {
        pool,
        config: config.clone(),
        store: store.clone(),
        tmdb,
    };

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests as usize,
        config.rate_limit_window(),
    ));
    let sweeper = rate_limiter
        .clone()
        .start_sweep(config.rate_limit_sweep_interval());

    // GET routes grouped by page-cache lifetime
    let movie_list = Router::new()
        .route("/movies", get(routes::movie::list_movies))
        .route_layer(axum::middleware::from_fn_with_state(
            PageCache::new(store.clone(), MOVIE_LIST_TTL),
            cache_page,
        ));
    let movie_search = Router::new()
        .route("/movies/search", get(routes::movie::search_movies))
        .route_layer(axum::middleware::from_fn_with_state(
            PageCache::new(store.clone(), MOVIE_SEARCH_TTL),
            cache_page,
        ));
    let movie_detail = Router::new()
        .route("/movies/{id}", get(routes::movie::get_movie))
        .route_layer(axum::middleware::from_fn_with_state(
            PageCache::new(store.clone(), MOVIE_DETAIL_TTL),
            cache_page,
        ));
    let tmdb_search = Router::new()
        .route("/tmdb/search", get(routes::tmdb::search))
        .route_layer(axum::middleware::from_fn_with_state(
            PageCache::new(store.clone(), TMDB_SEARCH_TTL),
            cache_page,
        ));
    let tmdb_detail = Router::new()
        .route("/tmdb/movie/{id}", get(routes::tmdb::movie_details))
        .route_layer(axum::middleware::from_fn_with_state(
            PageCache::new(store.clone(), TMDB_DETAIL_TTL),
            cache_page,
        ));

    let image_routes = Router::new()
        .route(
            "/movies/{id}/image",
            post(routes::image::upload_image)
                .get(routes::image::get_image)
                .delete(routes::image::delete_image),
        )
        .route_layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let uncached_routes = Router::new()
        .route("/movies", post(routes::movie::create_movie))
        .route(
            "/movies/{id}",
            put(routes::movie::update_movie).delete(routes::movie::delete_movie),
        )
        .route("/tmdb/test", get(routes::tmdb::test_connection))
        .route("/version", get(routes::version::get_version))
        .route("/sbom", get(routes::version::get_sbom));

    let router = Router::new()
        .merge(movie_list)
        .merge(movie_search)
        .merge(movie_detail)
        .merge(tmdb_search)
        .merge(tmdb_detail)
        .merge(image_routes)
        .merge(uncached_routes);

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 3600));

    // rate limiting sits outside everything except CORS, so rejected
    // requests never reach a handler or the page cache
    let router = router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn(no_store_headers))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter.clone(),
            rate_limit,
        ))
        .layer(cors);

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {} (version {})", addr, version::version());
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    sweeper.abort();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
}
