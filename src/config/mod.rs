use std::env;
use std::time::Duration;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost,http://localhost:3000,http://localhost:5173,http://localhost:8080,http://localhost:8082";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub upload_path: String,
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok(),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(8080),
            tmdb_api_key: env::var("TMDB_API_KEY")?,
            tmdb_base_url: env::var("TMDB_BASE_URL")
                .unwrap_or_else(|_| "https://api.themoviedb.org/3".into()),
            tmdb_image_base_url: env::var("TMDB_IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://image.tmdb.org/t/p/w500".into()),
            upload_path: env::var("UPLOAD_PATH").unwrap_or_else(|_| "images".into()),
            allowed_origins,
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(100),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(60),
            rate_limit_sweep_secs: env::var("RATE_LIMIT_SWEEP_INTERVAL")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(300),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }
}
