//! Hugging Face Inference API provider.
//!
//! Sends `{"inputs": <prompt>}` to a text-generation model endpoint and
//! reads `generated_text` from the first element of the returned array.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::Result;

use super::{parse_provider_error, TextGenerator};

/// Provider for a single Hugging Face text-generation model.
pub struct HuggingFaceProvider {
    api_key: Option<String>,
    model_url: String,
    client: Client,
}

impl std::fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_url", &self.model_url)
            .finish()
    }
}

impl HuggingFaceProvider {
    /// Build a provider for `model_url` with an optional bearer credential.
    pub fn new(api_key: Option<&str>, model_url: &str) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            model_url: model_url.to_string(),
            client: Client::new(),
        }
    }

    /// Build from configuration, applying the optional request timeout.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model_url: config.model_url.clone(),
            client,
        })
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request payload for a prompt.
    pub fn build_request_body(prompt: &str) -> Value {
        json!({ "inputs": prompt })
    }

    /// Pull `generated_text` out of a text-generation response.
    ///
    /// Returns `None` unless the body is an array whose first element has a
    /// non-empty string `generated_text`.
    pub fn extract_generated_text(response: &Value) -> Option<String> {
        response
            .as_array()?
            .first()?
            .get("generated_text")?
            .as_str()
            .filter(|text| !text.is_empty())
            .map(String::from)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceProvider {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        debug!(url = %self.model_url, "Hugging Face inference request");

        let request = self
            .client
            .post(&self.model_url)
            .json(&Self::build_request_body(prompt));
        let response = self.apply_auth(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_provider_error(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        // A success status with a non-JSON body is a malformed response, not
        // a failed call.
        let json: Value = match serde_json::from_slice(&bytes) {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "Hugging Face response is not JSON");
                return Ok(None);
            }
        };
        Ok(Self::extract_generated_text(&json))
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}
