use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::TtlCache;
use crate::config::Config;

const LANGUAGE: &str = "de-DE";
const MAX_QUERY_LEN: usize = 500;
const SEARCH_TTL: Duration = Duration::from_secs(60);
const DETAILS_TTL: Duration = Duration::from_secs(3600);

/// Client for the TMDB metadata API. Parsed responses are memoized so
/// repeated lookups do not hit the upstream: search results stay fresh for a
/// minute, detail lookups for an hour.
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    image_base_url: String,
    http: reqwest::Client,
    cache: TtlCache<Value>,
}

#[derive(Debug)]
pub enum TmdbError {
    InvalidId,
    QueryTooLong,
    NotFound,
    Status(u16),
    Request(reqwest::Error),
}

impl fmt::Display for TmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TmdbError::InvalidId => write!(f, "invalid movie ID"),
            TmdbError::QueryTooLong => write!(f, "search query too long"),
            TmdbError::NotFound => write!(f, "movie not found"),
            TmdbError::Status(code) => write!(f, "TMDB API error: {}", code),
            TmdbError::Request(err) => write!(f, "TMDB request failed: {}", err),
        }
    }
}

impl std::error::Error for TmdbError {}

impl From<reqwest::Error> for TmdbError {
    fn from(err: reqwest::Error) -> Self {
        TmdbError::Request(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub credits: Credits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<TmdbMovie>,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.tmdb_api_key.clone(),
            base_url: config.tmdb_base_url.clone(),
            image_base_url: config.tmdb_image_base_url.clone(),
            http: reqwest::Client::new(),
            cache: TtlCache::new(),
        }
    }

    pub async fn search_movies(&self, query: &str) -> Result<Vec<TmdbMovie>, TmdbError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(TmdbError::QueryTooLong);
        }

        let key = format!("search:{}", query);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(movies) = serde_json::from_value::<Vec<TmdbMovie>>(cached) {
                tracing::debug!("TMDB cache hit: {}", key);
                return Ok(movies);
            }
        }

        let url = format!("{}/search/movie", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("language", LANGUAGE),
                ("include_adult", "false"),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TmdbError::Status(response.status().as_u16()));
        }

        let results = response.json::<SearchResponse>().await?.results;
        if let Ok(value) = serde_json::to_value(&results) {
            self.cache.set(key, value, SEARCH_TTL);
        }
        Ok(results)
    }

    pub async fn movie_details(&self, id: i64) -> Result<TmdbMovie, TmdbError> {
        if id <= 0 {
            return Err(TmdbError::InvalidId);
        }

        let key = format!("movie:{}", id);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(movie) = serde_json::from_value::<TmdbMovie>(cached) {
                tracing::debug!("TMDB cache hit: {}", key);
                return Ok(movie);
            }
        }

        let url = format!("{}/movie/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", LANGUAGE)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TmdbError::NotFound);
        }
        if response.status() != StatusCode::OK {
            return Err(TmdbError::Status(response.status().as_u16()));
        }

        let movie = response.json::<TmdbMovie>().await?;
        if let Ok(value) = serde_json::to_value(&movie) {
            self.cache.set(key, value, DETAILS_TTL);
        }
        Ok(movie)
    }

    pub async fn test_connection(&self) -> Result<(), TmdbError> {
        let url = format!("{}/configuration", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TmdbError::Status(response.status().as_u16()));
        }

        // a 200 with a broken payload still counts as unreachable
        response.json::<Value>().await?;
        Ok(())
    }

    pub fn image_url(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}", self.image_base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> TmdbClient {
        TmdbClient {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            http: reqwest::Client::new(),
            cache: TtlCache::new(),
        }
    }

    #[tokio::test]
    async fn empty_query_returns_no_results_without_an_upstream_call() {
        let client = test_client();
        let movies = client.search_movies("").await.unwrap();
        assert!(movies.is_empty());
    }

    #[tokio::test]
    async fn overlong_query_is_rejected() {
        let client = test_client();
        let query = "x".repeat(MAX_QUERY_LEN + 1);
        assert!(matches!(
            client.search_movies(&query).await,
            Err(TmdbError::QueryTooLong)
        ));
    }

    #[tokio::test]
    async fn non_positive_id_is_rejected() {
        let client = test_client();
        assert!(matches!(
            client.movie_details(0).await,
            Err(TmdbError::InvalidId)
        ));
        assert!(matches!(
            client.movie_details(-7).await,
            Err(TmdbError::InvalidId)
        ));
    }

    #[tokio::test]
    async fn cached_details_are_served_without_an_upstream_call() {
        let client = test_client();
        let movie = TmdbMovie {
            id: 42,
            title: "Cached".to_string(),
            poster_path: None,
            release_date: "1999-01-01".to_string(),
            overview: String::new(),
            credits: Credits::default(),
        };
        client.cache.set(
            "movie:42",
            serde_json::to_value(&movie).unwrap(),
            Duration::from_secs(60),
        );

        // base_url points nowhere, so a hit is the only way this succeeds
        let found = client.movie_details(42).await.unwrap();
        assert_eq!(found.title, "Cached");
    }

    #[test]
    fn image_url_joins_relative_paths_and_passes_absolute_ones_through() {
        let client = test_client();
        assert_eq!(client.image_url(""), "");
        assert_eq!(
            client.image_url("/abc.jpg"),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(
            client.image_url("http://example.com/p.jpg"),
            "http://example.com/p.jpg"
        );
    }

    #[test]
    fn search_results_parse_with_missing_optional_fields() {
        let payload = r#"{"results": [{"id": 550, "title": "Fight Club", "poster_path": null}]}"#;
        let parsed: SearchResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].id, 550);
        assert!(parsed.results[0].poster_path.is_none());
        assert!(parsed.results[0].credits.cast.is_empty());
    }
}
