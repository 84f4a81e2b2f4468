//! Per-client fixed-window rate limiting.
//!
//! Each client gets a window that opens on its first request and lasts
//! `window`. Every request in the window is counted; once the count passes
//! `max_requests` further requests are refused until the window resets.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Counter for one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests still admitted in the current window.
    pub remaining: u32,
    /// Time until the window resets.
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until reset, rounded up so clients never retry early.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// In-memory per-client limiter shared by all requests.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `client` and decide whether to admit it.
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let state = windows.entry(client.to_string()).or_insert(Window {
            count: 0,
            resets_at: now + self.window,
        });

        if now >= state.resets_at {
            debug!(client, "Rate limit window reset");
            state.count = 0;
            state.resets_at = now + self.window;
        }

        state.count = state.count.saturating_add(1);
        let allowed = state.count <= self.max_requests;
        if !allowed {
            warn!(client, count = state.count, "Rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(state.count),
            reset_after: state.resets_at.saturating_duration_since(now),
        }
    }

    /// Drop windows that have already reset. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| w.resets_at > now);
        before - windows.len()
    }

    /// Number of clients with a live or stale window.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}
