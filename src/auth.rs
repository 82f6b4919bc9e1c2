//! Caller identity for owners and admins
//!
//! Owners are authenticated upstream; the proxy in front of this service puts
//! the authenticated user id in a request header. Admin endpoints (state
//! export/import) use HTTP Basic Auth.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::env_string;
use crate::error::PollError;
use crate::state::AppState;
use crate::types::OwnerId;

/// Header carrying the authenticated owner id by default
pub const DEFAULT_OWNER_HEADER: &str = "x-owner-id";

#[derive(Debug, Clone)]
pub struct OwnerConfig {
    pub header: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_OWNER_HEADER.to_string(),
        }
    }
}

impl OwnerConfig {
    /// OWNER_HEADER overrides the header name
    pub fn from_env() -> Self {
        let header = env_string("OWNER_HEADER")
            .map(|h| h.to_lowercase())
            .unwrap_or_else(|| DEFAULT_OWNER_HEADER.to_string());
        tracing::info!(header = %header, "Owner header configured");
        Self { header }
    }
}

/// The authenticated owner of the request, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub Option<OwnerId>);

impl Owner {
    pub fn id(&self) -> Option<&OwnerId> {
        self.0.as_ref()
    }
}

impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(state.owner.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(Owner(owner))
    }
}

/// Admin credentials for state export/import
#[derive(Debug, Clone, Default)]
pub struct AdminAuthConfig {
    /// Username (None = admin endpoints disabled)
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AdminAuthConfig {
    /// ADMIN_USERNAME and ADMIN_PASSWORD must both be set to enable admin access
    pub fn from_env() -> Self {
        let username = env_string("ADMIN_USERNAME");
        let password = env_string("ADMIN_PASSWORD");

        if username.is_some() && password.is_some() {
            tracing::info!("Admin authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "ADMIN_USERNAME and ADMIN_PASSWORD must both be set to enable admin access"
                );
            }
            tracing::warn!("Admin endpoints disabled - state export/import will be refused");
            Self::default()
        }
    }

    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate credentials. Always false while disabled.
    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                // Both comparisons always run
                let user_ok = constant_time_eq(u.as_bytes(), username.as_bytes());
                let pass_ok = constant_time_eq(p.as_bytes(), password.as_bytes());
                user_ok && pass_ok
            }
            _ => false,
        }
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Parse an `Authorization: Basic ...` header value into (username, password)
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware for HTTP Basic Authentication on admin routes
pub async fn admin_auth_middleware(
    State(auth_config): State<Arc<AdminAuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_auth);

    if let Some((username, password)) = credentials {
        if auth_config.validate(&username, &password) {
            return next.run(request).await;
        }
        tracing::warn!(uri = %request.uri(), "Rejected admin credentials");
    }

    unauthorized()
}

fn unauthorized() -> Response<Body> {
    let mut response = PollError::Unauthorized.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static("Basic realm=\"quickpoll admin\""),
    );
    response
}
