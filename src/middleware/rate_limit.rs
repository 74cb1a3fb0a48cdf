use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::task::JoinHandle;

use crate::error::AppError;

/// Sliding-window request limiter. Remembers the admission instants of every
/// client inside the trailing window; the periodic sweep forgets clients that
/// have gone idle so the map cannot grow without bound.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Decides whether `client` may send another request right now. Prunes
    /// timestamps that fell out of the window, rejects at capacity without
    /// recording the attempt, records the admission otherwise.
    pub fn admit(&self, client: &str) -> bool {
        if self.window.is_zero() {
            return false;
        }

        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap();
        let timestamps = clients.entry(client.to_string()).or_default();

        timestamps.retain(|instant| now.duration_since(*instant) <= self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Prunes every tracked client and drops the ones without an admission
    /// left inside the window. Returns how many client records were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap();
        let before = clients.len();

        clients.retain(|_, timestamps| {
            timestamps.retain(|instant| now.duration_since(*instant) <= self.window);
            !timestamps.is_empty()
        });

        before - clients.len()
    }

    /// Number of clients currently tracked, idle ones included until the
    /// next sweep.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Spawns the periodic sweep task. The caller owns the handle and aborts
    /// it at shutdown.
    pub fn start_sweep(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    tracing::debug!("Rate limiter sweep removed {} idle clients", removed);
                }
            }
        })
    }
}

/// Client identity for rate limiting: proxy headers first, then the peer
/// address from the connection.
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|header| header.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|header| header.to_str().ok())
                .and_then(|hops| hops.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !limiter.admit(&ip) {
        tracing::warn!("Rate limit exceeded for {}", ip);
        return AppError::TooManyRequests.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn admits_up_to_the_limit_and_rejects_the_next_request() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));

        assert!(limiter.admit("203.0.113.8"));
    }

    #[test]
    fn rejected_attempts_are_not_counted_against_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(600));

        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));

        thread::sleep(Duration::from_millis(400));
        assert!(!limiter.admit("203.0.113.7"));

        // by now only the rejected attempts fall inside the window, and those
        // were never recorded
        thread::sleep(Duration::from_millis(400));
        assert!(limiter.admit("203.0.113.7"));
    }

    #[test]
    fn admission_resumes_after_the_window_slides() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(limiter.admit("203.0.113.7"));
        assert!(!limiter.admit("203.0.113.7"));

        thread::sleep(Duration::from_millis(1100));
        assert!(limiter.admit("203.0.113.7"));
    }

    #[test]
    fn sweep_forgets_idle_clients_but_keeps_active_ones() {
        let limiter = RateLimiter::new(10, Duration::from_millis(80));

        assert!(limiter.admit("203.0.113.7"));
        thread::sleep(Duration::from_millis(120));
        assert!(limiter.admit("203.0.113.8"));
        assert_eq!(limiter.tracked_clients(), 2);

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.admit("203.0.113.8"));
    }

    #[test]
    fn zero_window_rejects_everything() {
        let limiter = RateLimiter::new(100, Duration::ZERO);

        assert!(!limiter.admit("203.0.113.7"));
    }
}
