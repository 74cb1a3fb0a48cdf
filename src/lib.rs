use std::sync::Arc;

use sqlx::PgPool;

use cache::CacheStore;
use config::Config;
use tmdb::TmdbClient;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod tmdb;
pub mod version;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub store: Arc<CacheStore>,
    pub tmdb: Arc<TmdbClient>,
}
