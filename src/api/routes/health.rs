//! Health endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;

/// GET /health — liveness plus cache counters. Not rate limited.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.relay.cache_stats().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "entries": stats.total_entries,
            "hits": stats.total_hits,
        },
    }))
}
