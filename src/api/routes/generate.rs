//! `POST /generate` — turn a name into a compliment.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::server::AppState;
use crate::error::Result;
use crate::gatekeeper::name_from_body;

/// Request body for `POST /generate`. `name` is optional.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Successful response from `POST /generate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub compliment: String,
}

/// Validate the name, then serve the compliment from cache or upstream.
///
/// The body is decoded by hand rather than with the `Json` extractor so an
/// empty or content-type-less body falls back to the default name, and
/// every bad body gets the same plain-text 400.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerateResponse>> {
    let name = name_from_body(&body).inspect_err(|e| debug!(error = %e, "Rejected name"))?;
    let compliment = state.relay.compliment(&name).await?;
    Ok(Json(GenerateResponse { compliment }))
}
