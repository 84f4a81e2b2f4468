//! Request middleware for the relay API.
//!
//! - [`rate_limit_middleware`] throttles `POST /generate` per client IP
//!   before the handler runs.
//! - [`with_security_headers`] adds the usual hardening response headers to
//!   every route.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use super::server::AppState;
use crate::error::RelayError;
use crate::gatekeeper::RateLimitDecision;

/// Identity used when the peer address is not known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Response headers added to every response unless a handler already set them.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    ),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Wrap `router` so every response carries [`SECURITY_HEADERS`].
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SECURITY_HEADERS
        .iter()
        .fold(router, |router, &(name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

/// Client identity for throttling: the peer IP, or [`UNKNOWN_CLIENT`].
pub fn client_identity<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Count the request against the caller's quota; reject with 429 when over.
///
/// Both admitted and rejected responses carry `RateLimit-*` headers.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let client = client_identity(&request);
    let decision = state.limiter.check(&client).await;
    let window_secs = state.limiter.window().as_secs();

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        RelayError::RateLimited {
            retry_after_secs: decision.reset_after_secs(),
        }
        .into_response()
    };
    apply_rate_limit_headers(response.headers_mut(), &decision, window_secs);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision, window_secs: u64) {
    if let Ok(policy) = HeaderValue::from_str(&format!("{};w={}", decision.limit, window_secs)) {
        headers.insert(HeaderName::from_static("ratelimit-policy"), policy);
    }
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(decision.reset_after_secs()),
    );
}

// ============================================================================
// Tests
// ============================================================================
