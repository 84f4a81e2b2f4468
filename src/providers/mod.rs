//! Text-generation backends.
//!
//! The relay only needs one operation from a backend: turn a prompt into
//! generated text. [`TextGenerator`] is that seam; [`HuggingFaceProvider`]
//! is the production implementation.

pub mod huggingface;

pub use huggingface::HuggingFaceProvider;

use async_trait::async_trait;

use crate::error::{RelayError, Result};

/// A backend that completes a prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` upstream and return the generated text.
    ///
    /// `Ok(None)` means the call succeeded but the response carried no
    /// usable text. `Err` means the call itself failed.
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Turn a non-success upstream status into a [`RelayError`].
///
/// The message is for server logs only; callers never see it.
pub fn parse_provider_error(status: u16, body: &str) -> RelayError {
    let reason = match status {
        401 | 403 => "authentication rejected",
        404 => "model not found",
        429 => "upstream rate limit",
        503 => "model loading or unavailable",
        500..=599 => "upstream server error",
        _ => "unexpected status",
    };
    let snippet: String = body.chars().take(200).collect();
    RelayError::Provider(format!("{reason} (HTTP {status}): {snippet}"))
}
