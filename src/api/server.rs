//! Axum API server for the compliment relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::gatekeeper::RateLimiter;
use crate::relay::ComplimentRelay;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Memoizing relay in front of the inference API.
    pub relay: Arc<ComplimentRelay>,
    /// Per-client quota for `POST /generate`.
    pub limiter: Arc<RateLimiter>,
    /// The single origin allowed cross-origin access.
    pub cors_origin: HeaderValue,
}

impl AppState {
    pub fn new(
        relay: Arc<ComplimentRelay>,
        limiter: Arc<RateLimiter>,
        cors_origin: &str,
    ) -> Result<Self> {
        let cors_origin = HeaderValue::from_str(cors_origin)
            .map_err(|e| RelayError::Config(format!("invalid CORS origin {cors_origin:?}: {e}")))?;
        Ok(Self {
            relay,
            limiter,
            cors_origin,
        })
    }
}

/// Build the axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // CORS: only the configured frontend origin, GET/POST, Content-Type.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(state.cors_origin.clone()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let shared_state = Arc::new(state);

    // Only the generate route is throttled.
    let generate = Router::new()
        .route("/generate", post(super::routes::generate::generate))
        .route_layer(axum_mw::from_fn_with_state(
            shared_state.clone(),
            super::middleware::rate_limit_middleware,
        ));

    let router = Router::new()
        .route("/health", get(super::routes::health::get_health))
        .merge(generate)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    super::middleware::with_security_headers(router)
}

/// Periodically drop expired cache entries and rate-limit windows.
pub fn spawn_sweeper(
    relay: Arc<ComplimentRelay>,
    limiter: Arc<RateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        loop {
            ticker.tick().await;
            let entries = relay.evict_expired().await;
            let windows = limiter.prune_expired().await;
            debug!(entries, windows, "Swept expired cache entries and rate-limit windows");
        }
    })
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(config: &RelayConfig, state: AppState) -> Result<()> {
    let app = build_router(state);
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Compliment relay listening on http://{addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("Compliment relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::generate::{GenerateRequest, GenerateResponse};
    use crate::cache::ResponseCache;
    use crate::error::{GENERATION_FAILED_MESSAGE, INVALID_NAME_MESSAGE, RATE_LIMITED_MESSAGE};
    use crate::providers::TextGenerator;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;

    /// Generator that replays a fixed reply and counts calls.
    struct StubGenerator {
        reply: std::result::Result<Option<String>, String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(RelayError::Provider)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct Harness {
        app: Router,
        relay: Arc<ComplimentRelay>,
        calls: Arc<AtomicUsize>,
    }

    fn harness(reply: std::result::Result<Option<String>, String>) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = StubGenerator {
            reply,
            calls: calls.clone(),
        };
        let relay = Arc::new(ComplimentRelay::new(
            Arc::new(generator),
            ResponseCache::new(Duration::from_secs(60), 100),
        ));
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let state = AppState::new(relay.clone(), limiter, "http://localhost:3000").unwrap();
        Harness {
            app: build_router(state),
            relay,
            calls,
        }
    }

    fn generate_request(ip: [u8; 4], body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header("content-type", "application/json")
            .extension(ConnectInfo(SocketAddr::from((ip, 50000))))
            .body(body.into())
            .unwrap()
    }

    fn named(name: &str) -> Vec<u8> {
        serde_json::to_vec(&GenerateRequest {
            name: Some(name.to_string()),
        })
        .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_compliment_then_serves_cache() {
        let h = harness(Ok(Some("Alice, you are brilliant.".into())));

        for _ in 0..2 {
            let resp = h
                .app
                .clone()
                .oneshot(generate_request([1, 1, 1, 1], named("Alice")))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let body: GenerateResponse = serde_json::from_str(&body_string(resp).await).unwrap();
            assert_eq!(body.compliment, "Alice, you are brilliant.");
        }

        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert!(h.relay.is_cached("Alice").await);
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_upstream() {
        let h = harness(Ok(Some("unused".into())));

        for bad in ["R2D2", "Jean Luc", "   !!!  "] {
            let resp = h
                .app
                .clone()
                .oneshot(generate_request([1, 1, 1, 2], named(bad)))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{bad:?}");
            assert_eq!(body_string(resp).await, INVALID_NAME_MESSAGE);
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_name_uses_fallback() {
        let h = harness(Ok(None));
        let resp = h
            .app
            .clone()
            .oneshot(generate_request([1, 1, 1, 3], Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: GenerateResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body.compliment, "You're awesome, friend!");
        assert!(h.relay.is_cached("friend").await);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = harness(Ok(Some("unused".into())));
        let resp = h
            .app
            .oneshot(generate_request([1, 1, 1, 4], "{\"name\":"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scalar_json_body_is_bad_request() {
        let h = harness(Ok(Some("unused".into())));
        let resp = h
            .app
            .oneshot(generate_request([1, 1, 1, 5], "42"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_eleventh_request_throttled_regardless_of_payload() {
        let h = harness(Ok(Some("nice".into())));

        for i in 0..10 {
            let body = if i % 2 == 0 { named("Bob") } else { named("B0b") };
            let resp = h
                .app
                .clone()
                .oneshot(generate_request([2, 2, 2, 2], body))
                .await
                .unwrap();
            assert_ne!(resp.status(), StatusCode::TOO_MANY_REQUESTS, "request {}", i + 1);
        }

        let resp = h
            .app
            .clone()
            .oneshot(generate_request([2, 2, 2, 2], named("Bob")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_string(resp).await, RATE_LIMITED_MESSAGE);

        let resp = h
            .app
            .clone()
            .oneshot(generate_request([3, 3, 3, 3], named("Bob")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic_500_and_not_cached() {
        let h = harness(Err("HTTP 401: Invalid token hf_leaked".into()));
        let resp = h
            .app
            .clone()
            .oneshot(generate_request([4, 4, 4, 4], named("Carol")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(resp).await;
        assert!(!body.contains("hf_leaked"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": GENERATION_FAILED_MESSAGE }));
        assert!(!h.relay.is_cached("Carol").await);
    }

    #[tokio::test]
    async fn test_echoed_prompt_stripped_in_response() {
        let echoed = format!(
            "{}  \n Dave, your patience is a gift. ",
            crate::relay::prompt::instruction("Dave")
        );
        let h = harness(Ok(Some(echoed)));
        let resp = h
            .app
            .oneshot(generate_request([5, 5, 5, 5], named("Dave")))
            .await
            .unwrap();
        let body: GenerateResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body.compliment, "Dave, your patience is a gift.");
    }

    #[tokio::test]
    async fn test_health_not_rate_limited() {
        let h = harness(Ok(None));
        for _ in 0..15 {
            let resp = h
                .app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/health")
                        .extension(ConnectInfo(SocketAddr::from(([6, 6, 6, 6], 1))))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(!resp.headers().contains_key("ratelimit-limit"));
        }
    }

    #[tokio::test]
    async fn test_cors_preflight_from_allowed_origin() {
        let h = harness(Ok(None));
        let resp = h
            .app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/generate")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        let methods = resp.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("GET") && methods.contains("POST"));
        assert!(!methods.contains("DELETE"));
    }

    #[tokio::test]
    async fn test_cors_other_origin_not_allowed() {
        let h = harness(Ok(Some("hi".into())));
        let mut req = generate_request([7, 7, 7, 7], named("Eve"));
        req.headers_mut()
            .insert("origin", HeaderValue::from_static("http://evil.example"));
        let resp = h.app.oneshot(req).await.unwrap();
        // The configured origin is always advertised; browsers reject the
        // mismatch against the requesting origin.
        assert_eq!(
            resp.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_ne!(
            resp.headers()["access-control-allow-origin"],
            "http://evil.example"
        );
    }

    #[tokio::test]
    async fn test_responses_carry_security_headers() {
        let h = harness(Ok(Some("hi".into())));
        let resp = h
            .app
            .oneshot(generate_request([8, 8, 8, 8], named("Finn")))
            .await
            .unwrap();
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
        assert_eq!(resp.headers()["x-frame-options"], "SAMEORIGIN");
        assert_eq!(resp.headers()["ratelimit-remaining"], "9");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let h = harness(Ok(Some("hi".into())));
        let big = format!("{{\"name\":\"{}\"}}", "a".repeat(MAX_BODY_BYTES + 1));
        let resp = h
            .app
            .oneshot(generate_request([9, 9, 9, 9], big))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_cors_origin_is_config_error() {
        let relay = Arc::new(ComplimentRelay::new(
            Arc::new(StubGenerator {
                reply: Ok(None),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            ResponseCache::new(Duration::from_secs(60), 1),
        ));
        let limiter = Arc::new(RateLimiter::new(1, Duration::from_secs(1)));
        let err = AppState::new(relay, limiter, "bad\norigin").err().unwrap();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_expired_entries() {
        let h = harness(Ok(Some("hi".into())));
        h.relay.compliment("Gus").await.unwrap();
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        limiter.check("1.2.3.4").await;

        let handle = spawn_sweeper(h.relay.clone(), limiter.clone(), Duration::from_secs(600));
        tokio::time::sleep(Duration::from_secs(601)).await;

        assert_eq!(h.relay.cache_stats().await.total_entries, 0);
        assert_eq!(limiter.tracked_clients().await, 0);
        handle.abort();
    }
}
