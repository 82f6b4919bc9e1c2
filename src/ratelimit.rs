//! Rate limiting for vote submissions
//!
//! Keyed by voter token, not IP: many visitors share one public address
//! behind NAT or venue WiFi.

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::config::{env_flag, env_parse};
use crate::error::PollError;
use crate::state::AppState;
use crate::types::VoterToken;

/// Fixed-window request counter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of key to (request count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(20, Duration::from_secs(10))
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if the request is allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        match requests.get_mut(key) {
            Some((count, window_start)) => {
                // Window expired, start counting again
                if now.duration_since(*window_start) >= self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    // Stays blocked until the window rolls over
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                // First request from this key
                requests.insert(key.to_string(), (1, now));
                true
            }
        }
    }

    /// Drop entries whose window has long expired
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }

    pub async fn tracked_keys(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window: Duration::from_secs(10),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let enabled = env_flag("VOTE_RATE_LIMIT", defaults.enabled);
        let max_requests = env_parse("VOTE_RATE_LIMIT_MAX", defaults.max_requests);
        let window_secs = env_parse("VOTE_RATE_LIMIT_WINDOW", defaults.window.as_secs());

        tracing::info!(enabled, max_requests, window_secs, "Vote rate limit config loaded");

        Self {
            enabled,
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn build(&self) -> Option<RateLimiter> {
        self.enabled
            .then(|| RateLimiter::new(self.max_requests, self.window))
    }
}

/// Periodically drop stale limiter entries
pub fn spawn_limiter_cleanup(limiter: RateLimiter) {
    tokio::spawn(async move {
        // interval() panics on a zero period
        let period = (limiter.window() * 2).max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}

/// Middleware limiting vote submissions per voter token.
///
/// Must run inside the voter token middleware so the token extension is set.
pub async fn vote_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ref limiter) = state.vote_limiter {
        if let Some(token) = request.extensions().get::<VoterToken>() {
            let key = format!("voter:{}", token);
            if !limiter.check(&key).await {
                tracing::warn!(uri = %request.uri(), "Vote rate limited");
                return PollError::RateLimited {
                    retry_after: limiter.window(),
                }
                .into_response();
            }
        }
    }

    next.run(request).await
}
