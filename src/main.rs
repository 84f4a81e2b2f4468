use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use compliment_relay::api::server::spawn_sweeper;
use compliment_relay::cache::ResponseCache;
use compliment_relay::gatekeeper::RateLimiter;
use compliment_relay::providers::{HuggingFaceProvider, TextGenerator};
use compliment_relay::{start_server, AppState, ComplimentRelay, RelayConfig};

const DEFAULT_LOG_FILTER: &str = "compliment_relay=info,tower_http=info";

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Relay that turns a name into a generated compliment.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Log output format
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let mut config = RelayConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let provider = HuggingFaceProvider::from_config(&config.provider)
        .context("failed to build inference client")?;
    if !provider.has_credentials() {
        warn!("HF_API_KEY is not set; inference requests will be sent unauthenticated");
    }
    info!(
        provider = provider.name(),
        model_url = provider.model_url(),
        cache_ttl_secs = config.cache.ttl.as_secs(),
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window.as_secs(),
        "Starting compliment relay"
    );

    let relay = Arc::new(ComplimentRelay::new(
        Arc::new(provider),
        ResponseCache::from_config(&config.cache),
    ));
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    let sweeper = spawn_sweeper(relay.clone(), limiter.clone(), config.sweep_interval);

    let state = AppState::new(relay, limiter, &config.cors_origin)?;
    let served = start_server(&config, state).await;
    sweeper.abort();
    served.context("server error")
}
