//! Error types for the compliment relay.
//!
//! Client-facing variants map to fixed, short response bodies. Upstream
//! failures are logged with full detail but always reach the caller as the
//! same generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Body returned for a name that fails validation.
pub const INVALID_NAME_MESSAGE: &str = "Invalid name input.";

/// Body returned for a request body that is not usable JSON.
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body.";

/// Body returned when a client is over its request quota.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Generic error returned for any upstream failure.
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate compliment.";

#[derive(Debug, Error)]
pub enum RelayError {
    /// The supplied name is not purely alphabetic, or not a string.
    #[error("invalid name input: {0:?}")]
    InvalidName(String),

    /// The request body could not be parsed.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The client exceeded its quota for the current window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The inference API answered with an error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Transport failure talking to the inference API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// HTTP status this error maps to when it reaches a handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider(_) | Self::Http(_) | Self::Config(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::InvalidName(_) => (status, INVALID_NAME_MESSAGE).into_response(),
            Self::InvalidBody(_) => (status, INVALID_BODY_MESSAGE).into_response(),
            Self::RateLimited { retry_after_secs } => {
                let mut response = (status, RATE_LIMITED_MESSAGE).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs),
                );
                response
            }
            other => {
                tracing::error!(error = %other, "Compliment request failed");
                (status, Json(json!({ "error": GENERATION_FAILED_MESSAGE }))).into_response()
            }
        }
    }
}
