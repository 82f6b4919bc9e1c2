use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

use crate::types::QuestionId;
use crate::validation::ValidationError;

/// Result type for poll operations
pub type PollResult<T> = Result<T, PollError>;

/// Errors that can occur while creating, deleting or voting on questions
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Not authorized")]
    Unauthorized,

    #[error("Question not found: {0}")]
    NotFound(QuestionId),

    #[error("Option index {index} is out of range for {option_count} options")]
    InvalidIndex { index: i64, option_count: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Already voted on question {0}")]
    AlreadyVoted(QuestionId),

    /// Request body could not be read as the expected JSON
    #[error("{message}")]
    InvalidBody { status: StatusCode, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("Rate limit exceeded. Please slow down.")]
    RateLimited { retry_after: Duration },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PollError {
    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Unauthorized => StatusCode::UNAUTHORIZED,
            PollError::NotFound(_) => StatusCode::NOT_FOUND,
            PollError::InvalidIndex { .. } | PollError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PollError::AlreadyVoted(_) => StatusCode::CONFLICT,
            PollError::InvalidBody { status, .. } => *status,
            PollError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PollError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PollError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = ErrorMessage {
            error: self.to_string(),
            status: status.as_u16(),
        };
        let mut response = (status, Json(body)).into_response();

        if let PollError::RateLimited { retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<JsonRejection> for PollError {
    fn from(rejection: JsonRejection) -> Self {
        PollError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// `Json` extractor whose rejection is a [`PollError`], so malformed bodies
/// get the same JSON error shape as every other failure
#[derive(Debug, Clone, Copy, Default)]
pub struct PollJson<T>(pub T);

impl<S, T> FromRequest<S> for PollJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(PollJson(value))
    }
}
