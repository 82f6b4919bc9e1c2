pub mod export;
mod question;
mod vote;

use std::sync::{Arc, Mutex};

use ulid::{Generator, Ulid};

use crate::auth::OwnerConfig;
use crate::identity::CookieConfig;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::store::{MemoryStore, PollStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub cookie: CookieConfig,
    pub owner: OwnerConfig,
    /// Per-voter-token limiter for vote submissions (None = disabled)
    pub vote_limiter: Option<RateLimiter>,
    /// Monotonic within a millisecond, so ids sort in creation order
    ids: Arc<Mutex<Generator>>,
}

impl AppState {
    /// In-memory state with default config and no rate limiting
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn PollStore>) -> Self {
        Self {
            store,
            cookie: CookieConfig::default(),
            owner: OwnerConfig::default(),
            vote_limiter: None,
            ids: Arc::new(Mutex::new(Generator::new())),
        }
    }

    /// Build state with every concern configured from the environment
    pub fn from_env(store: Arc<dyn PollStore>) -> Self {
        Self {
            store,
            cookie: CookieConfig::from_env(),
            owner: OwnerConfig::from_env(),
            vote_limiter: RateLimitConfig::from_env().build(),
            ids: Arc::new(Mutex::new(Generator::new())),
        }
    }

    /// Next question or vote id
    pub(crate) fn next_id(&self) -> String {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        // Only fails once a millisecond's random space is exhausted
        ids.generate().unwrap_or_else(|_| Ulid::new()).to_string()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
