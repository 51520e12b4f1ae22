//! HTTP server binary for arxiv-eli5.
//!
//! Serves `POST /api/summarize` and `GET /api/health` on top of the library
//! crate's [`arxiv_eli5::server::router`].

use anyhow::{Context, Result};
use arxiv_eli5::server::{router, ServerOptions};
use arxiv_eli5::{ExplainConfig, Explainer, RateLimitConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve arXiv explanations over HTTP.
#[derive(Parser, Debug)]
#[command(name = "eli5-server", version, about = "HTTP API for arxiv-eli5")]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "ELI5_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Requests allowed per client per window.
    #[arg(long, env = "ELI5_RATE_LIMIT", default_value_t = 10)]
    rate_limit: u32,

    /// Rate-limit window in seconds.
    #[arg(long, env = "ELI5_RATE_WINDOW", default_value_t = 60)]
    rate_window: u64,

    /// Max request body size in bytes.
    #[arg(long, env = "ELI5_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    max_body_bytes: u64,

    /// Comma-separated API keys. When set, `X-API-Key` is required.
    #[arg(long, env = "ELI5_API_KEYS", value_delimiter = ',')]
    api_keys: Vec<String>,

    /// Comma-separated CORS origins. Empty allows any origin.
    #[arg(long, env = "ELI5_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Emit the `summary` field as a JSON-encoded string.
    #[arg(long, env = "ELI5_SUMMARY_AS_STRING")]
    summary_as_string: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ELI5_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut builder = ExplainConfig::builder();
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if cli.summary_as_string {
        builder = builder.summary_encoding(arxiv_eli5::SummaryEncoding::JsonString);
    }
    let config = builder.build().context("Invalid configuration")?;
    let explainer =
        Arc::new(Explainer::new(config).context("Failed to initialise the AI provider")?);

    let options = ServerOptions {
        rate_limit: RateLimitConfig {
            max_requests: cli.rate_limit.max(1),
            window_secs: cli.rate_window.max(1),
            max_body_bytes: cli.max_body_bytes.max(1),
        },
        api_keys: cli.api_keys,
        allowed_origins: cli.allowed_origins,
    };
    if !options.api_keys.is_empty() {
        info!("API key authentication enabled ({} keys)", options.api_keys.len());
    }

    let app = router(explainer, options);
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Listening on http://{}", cli.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // An error here means no signal handler; keep serving until killed
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
