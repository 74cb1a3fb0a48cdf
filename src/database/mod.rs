use std::time::Duration;

use sqlx::Executor;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

const CREATE_MOVIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    id SERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    year INTEGER NOT NULL,
    image_path TEXT NOT NULL DEFAULT '',
    poster_path TEXT NOT NULL DEFAULT '',
    tmdb_id TEXT NOT NULL DEFAULT '',
    overview TEXT NOT NULL DEFAULT '',
    release_date TEXT NOT NULL DEFAULT '',
    rating REAL NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Connects to Postgres, retrying while the database container is still
/// coming up.
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 1;
    loop {
        match try_connect(config).await {
            Ok(pool) => return Ok(pool),
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                tracing::warn!(
                    "Waiting for database (attempt {}/{}): {}",
                    attempt,
                    CONNECT_ATTEMPTS,
                    err
                );
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn try_connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(100)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'movie_catalog';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
}

/// Brings the schema up to date at startup.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_MOVIES_TABLE).execute(pool).await?;
    Ok(())
}
