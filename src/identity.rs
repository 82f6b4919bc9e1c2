//! Anonymous voter identity
//!
//! Every request leaves with a `voter-token` cookie. An existing non-empty
//! token is echoed back; otherwise a fresh 128-bit random token is minted.
//! The cookie is set on every response so the client's expiry is refreshed.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, Response},
    middleware::Next,
};
use rand::Rng;
use std::sync::Arc;

use crate::config::{env_flag, env_parse};
use crate::state::AppState;
use crate::types::VoterToken;

/// Name of the cookie carrying the voter token
pub const VOTER_COOKIE: &str = "voter-token";

/// Random bytes per token (128 bits)
const TOKEN_BYTES: usize = 16;

/// Cookie attributes for the voter token
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub max_age_days: u32,
    /// Add the `Secure` attribute (set when served over HTTPS)
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            max_age_days: 365,
            secure: false,
        }
    }
}

impl CookieConfig {
    /// Load cookie config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_age_days = env_parse("VOTER_COOKIE_MAX_AGE_DAYS", defaults.max_age_days);
        let secure = env_flag("VOTER_COOKIE_SECURE", defaults.secure);

        tracing::info!(max_age_days, secure, "Voter cookie config loaded");

        Self {
            max_age_days,
            secure,
        }
    }

    /// Build the `Set-Cookie` header value for a token
    pub fn set_cookie_value(&self, token: &VoterToken) -> String {
        let max_age = u64::from(self.max_age_days) * 24 * 60 * 60;
        let mut value = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax; HttpOnly",
            VOTER_COOKIE, token, max_age
        );
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}

/// Generate a fresh random voter token (32 hex chars)
pub fn generate_voter_token() -> VoterToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    VoterToken::new(hex::encode(bytes))
}

/// Reuse the incoming token if it is present and non-empty, otherwise mint one
pub fn assign_voter_token(existing: Option<&str>) -> VoterToken {
    match existing.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => VoterToken::new(value),
        None => generate_voter_token(),
    }
}

/// Find a cookie value by name across all `Cookie` headers.
///
/// Works on raw bytes: other cookies in the same header may carry non-ASCII
/// values, only the matching pair has to be valid UTF-8.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .flat_map(|value| value.as_bytes().split(|b| *b == b';'))
        .filter_map(|pair| {
            let eq = pair.iter().position(|b| *b == b'=')?;
            let (key, value) = (&pair[..eq], &pair[eq + 1..]);
            (key.trim_ascii() == name.as_bytes()).then_some(value)
        })
        .find_map(|value| std::str::from_utf8(value).ok())
        .map(|value| value.trim().trim_matches('"').to_string())
}

/// Middleware that ensures every request carries a voter token.
///
/// The token is inserted into the request extensions before the handler runs
/// and written back as a cookie on the way out.
pub async fn voter_token_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let existing = read_cookie(request.headers(), VOTER_COOKIE);
    let token = assign_voter_token(existing.as_deref());
    if existing.is_none() {
        tracing::debug!("Assigned new voter token");
    }

    request.extensions_mut().insert(token.clone());
    let mut response = next.run(request).await;

    match HeaderValue::from_str(&state.cookie.set_cookie_value(&token)) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => {
            tracing::warn!("Voter token is not a valid header value: {}", e);
        }
    }

    response
}
