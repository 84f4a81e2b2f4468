//! Compliment relay: a small HTTP service that turns a name into a short
//! generated compliment.
//!
//! Requests pass a per-client rate limiter and a name check, then a
//! memoizing relay that serves from a short-lived cache or asks the
//! Hugging Face Inference API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod providers;
pub mod relay;

pub use api::{build_router, start_server, AppState};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use relay::ComplimentRelay;
