//! Relay configuration.
//!
//! Everything is read from the process environment at startup (after
//! `.env` is loaded by the binary). Unset variables fall back to the
//! defaults below; set-but-unparseable numbers are rejected.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Hugging Face inference endpoint used when `HF_MODEL_URL` is unset.
pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.3";

/// The only origin allowed to call the relay cross-origin by default.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;
/// Longest accepted rate-limit window or sweep interval (one day).
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Per-client request quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of one counting window.
    pub window: Duration,
    /// Requests admitted per client within one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            max_requests: DEFAULT_RATE_LIMIT_MAX,
        }
    }
}

/// Result-cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a generated compliment is served from memory.
    pub ttl: Duration,
    /// Upper bound on cached names.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

/// Inference API settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Bearer credential. `None` sends requests unauthenticated.
    pub api_key: Option<String>,
    pub model_url: String,
    /// Whole-request timeout. `None` leaves reqwest's default (no timeout).
    pub timeout: Option<Duration>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_url", &self.model_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_url: DEFAULT_MODEL_URL.to_string(),
            timeout: None,
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind: String,
    pub port: u16,
    pub cors_origin: String,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub provider: ProviderConfig,
    /// How often expired cache entries and rate-limit windows are swept.
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            provider: ProviderConfig::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl RelayConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = parse_or(&get, "PORT", defaults.port)?;
        let cache_ttl = parse_or(&get, "CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let cache_max = parse_or(&get, "CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)?;
        let window = parse_or(&get, "RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?;
        let max_requests = parse_or(&get, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?;
        let sweep = parse_or(&get, "SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let timeout = get("HF_TIMEOUT_SECS")
            .map(|raw| parse_value::<u64>("HF_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(Duration::from_secs);

        check_interval("RATE_LIMIT_WINDOW_SECS", window)?;
        check_interval("SWEEP_INTERVAL_SECS", sweep)?;

        Ok(Self {
            bind: get("BIND").unwrap_or(defaults.bind),
            port,
            cors_origin: get("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            cache: CacheConfig {
                ttl: Duration::from_secs(cache_ttl),
                max_entries: cache_max,
            },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(window),
                max_requests,
            },
            provider: ProviderConfig {
                api_key: get("HF_API_KEY"),
                model_url: get("HF_MODEL_URL").unwrap_or(defaults.provider.model_url),
                timeout,
            },
            sweep_interval: Duration::from_secs(sweep),
        })
    }

    /// `bind:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Windows and intervals are added to the current instant, so they must be
/// non-zero and bounded.
fn check_interval(key: &str, secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_INTERVAL_SECS {
        return Err(RelayError::Config(format!(
            "{key} must be between 1 and {MAX_INTERVAL_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RelayError::Config(format!("{key}={raw:?} is not valid: {e}")))
}
