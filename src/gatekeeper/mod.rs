//! Request admission: per-client throttling and name validation.
//!
//! Throttling runs as router middleware (see `api::middleware`) so that a
//! throttled request never reaches the handler. Validation runs inside the
//! handler on the decoded body.

pub mod rate_limit;

pub use rate_limit::{RateLimitDecision, RateLimiter};

use serde_json::Value;

use crate::error::{RelayError, Result};

/// Name used when the request carries no name, or only whitespace.
pub const FALLBACK_NAME: &str = "friend";

/// Trim and validate a requested name, returning the cache key.
///
/// Absent or blank input becomes [`FALLBACK_NAME`]. Anything else must be
/// one or more ASCII letters after trimming.
pub fn validate_name(raw: Option<&str>) -> Result<String> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    let name = if trimmed.is_empty() {
        FALLBACK_NAME
    } else {
        trimmed
    };

    if is_alpha(name) {
        Ok(name.to_string())
    } else {
        Err(RelayError::InvalidName(name.to_string()))
    }
}

/// Extract and validate the name from a raw `POST /generate` body.
///
/// An empty body behaves like `{}`. Only objects and arrays are accepted at
/// the top level. A `name` that is present but not a string is rejected as
/// invalid input; `null` counts as absent.
pub fn name_from_body(body: &[u8]) -> Result<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return validate_name(None);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| RelayError::InvalidBody(e.to_string()))?;
    if !(value.is_object() || value.is_array()) {
        return Err(RelayError::InvalidBody(format!(
            "top-level JSON value must be an object or array, got {value}"
        )));
    }

    match value.get("name") {
        None | Some(Value::Null) => validate_name(None),
        Some(Value::String(name)) => validate_name(Some(name)),
        Some(other) => Err(RelayError::InvalidName(other.to_string())),
    }
}

fn is_alpha(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}
