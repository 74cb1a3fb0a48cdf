use std::fmt;
use std::time::Duration;

use redis::AsyncCommands;

use crate::cache::ttl::TtlCache;
use crate::config::Config;

/// Backend for cached pages: get/set/delete/flush over either the in-process
/// TTL cache or Redis, selected from configuration at startup.
pub enum CacheStore {
    Memory(TtlCache<Vec<u8>>),
    Redis(redis::Client),
}

#[derive(Debug)]
pub enum CacheError {
    Redis(redis::RedisError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Redis(err) => write!(f, "redis error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Redis(err)
    }
}

impl CacheStore {
    /// Uses Redis when `REDIS_URL` is configured, the in-memory cache
    /// otherwise (development and tests).
    pub fn from_config(config: &Config) -> Self {
        match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => {
                    tracing::info!("Using Redis page cache at {}", url);
                    CacheStore::Redis(client)
                }
                Err(err) => {
                    tracing::warn!(
                        "Invalid REDIS_URL ({}), falling back to in-memory page cache",
                        err
                    );
                    CacheStore::Memory(TtlCache::new())
                }
            },
            None => {
                tracing::info!("Using in-memory page cache");
                CacheStore::Memory(TtlCache::new())
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self {
            CacheStore::Memory(cache) => Ok(cache.get(key)),
            CacheStore::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let value: Option<Vec<u8>> = conn.get(key).await?;
                Ok(value)
            }
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheStore::Memory(cache) => {
                cache.set(key, value, ttl);
                Ok(())
            }
            CacheStore::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
                Ok(())
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheStore::Memory(cache) => {
                cache.delete(key);
                Ok(())
            }
            CacheStore::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.del(key).await?;
                Ok(())
            }
        }
    }

    /// Drops every cached page. Runs after each movie mutation so reads
    /// cannot observe stale data for the changed record.
    pub async fn flush(&self) -> Result<(), CacheError> {
        match self {
            CacheStore::Memory(cache) => {
                cache.clear();
                Ok(())
            }
            CacheStore::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = CacheStore::Memory(TtlCache::new());

        store
            .set("page:/movies", b"listing".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("page:/movies").await.unwrap(),
            Some(b"listing".to_vec())
        );

        store.delete("page:/movies").await.unwrap();
        assert_eq!(store.get("page:/movies").await.unwrap(), None);
    }

    #[tokio::test]
    async fn flush_empties_the_memory_store() {
        let store = CacheStore::Memory(TtlCache::new());

        store
            .set("page:/movies", b"a".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set("page:/movies/1", b"b".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        store.flush().await.unwrap();

        assert_eq!(store.get("page:/movies").await.unwrap(), None);
        assert_eq!(store.get("page:/movies/1").await.unwrap(), None);
    }
}
