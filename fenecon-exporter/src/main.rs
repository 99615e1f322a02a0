// FENECON Exporter - Prometheus multi-target exporter for FENECON systems
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # FENECON Exporter
//!
//! Prometheus multi-target exporter for FENECON energy management systems.
//! Prometheus passes the device in the `target` parameter of `/probe`.
//!
//! ## Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8080)
//! fenecon-exporter
//!
//! # Explicit channel queries, more parallel requests
//! fenecon-exporter --request-mode explicit --request-parallel 10
//!
//! # Probe a device
//! curl 'http://localhost:8080/probe?target=http://192.168.1.50&meter=2&ess=1'
//! ```

mod metrics;
mod probe;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use clap::{Parser, ValueEnum};
use fenecon_probe::{BasicAuth, ProbeConfig, ProbeError, QueryMode, RetryPolicy, DEFAULT_PARALLEL};
use metrics::encode_metrics;
use probe::{probe_handler, AppState};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human readable key=value lines
    Logfmt,
    /// One JSON object per line
    Json,
}

/// FENECON Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SERVER_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Time allowed for reading a request body
    #[arg(long, env = "SERVER_TIMEOUT_READ", default_value = "5s")]
    server_timeout_read: humantime::Duration,

    /// Time allowed for producing a response
    #[arg(long, env = "SERVER_TIMEOUT_WRITE", default_value = "60s")]
    server_timeout_write: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Logfmt)]
    log_format: LogFormat,

    /// Timeout of one device request, retries included
    #[arg(long, env = "FENECON_REQUEST_TIMEOUT", default_value = "10s")]
    request_timeout: humantime::Duration,

    /// Maximum number of parallel device requests per probe
    #[arg(long, env = "FENECON_REQUEST_PARALLEL", default_value_t = DEFAULT_PARALLEL)]
    request_parallel: usize,

    /// Retries of a failed device request
    #[arg(long, env = "FENECON_REQUEST_RETRIES", default_value_t = 2)]
    request_retries: u32,

    /// Minimum wait time between retries
    #[arg(long, env = "FENECON_REQUEST_WAITTIME", default_value = "2s")]
    request_waittime: humantime::Duration,

    /// Maximum wait time between retries
    #[arg(long, env = "FENECON_REQUEST_MAXWAITTIME", default_value = "5s")]
    request_maxwaittime: humantime::Duration,

    /// Query mode (explicit, wildcard)
    #[arg(long, env = "FENECON_REQUEST_MODE", default_value = "wildcard")]
    request_mode: QueryMode,

    /// Username for device authentication
    #[arg(long, env = "FENECON_AUTH_USERNAME", default_value = "")]
    auth_username: String,

    /// Password for device authentication, empty disables authentication
    #[arg(long, env = "FENECON_AUTH_PASSWORD", default_value = "user", hide_env_values = true)]
    auth_password: String,
}

impl Args {
    fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            retry: RetryPolicy {
                max_retries: self.request_retries,
                min_backoff: *self.request_waittime,
                max_backoff: *self.request_maxwaittime,
                timeout: *self.request_timeout,
            },
            parallel: self.request_parallel,
            mode: self.request_mode,
            auth: BasicAuth::from_options(&self.auth_username, &self.auth_password),
            ..Default::default()
        }
    }

    fn server_timeouts(&self) -> ServerTimeouts {
        ServerTimeouts {
            read: *self.server_timeout_read,
            write: *self.server_timeout_write,
        }
    }
}

/// Limits applied to every inbound HTTP request
#[derive(Debug, Clone, Copy)]
struct ServerTimeouts {
    /// Reading the request body
    read: Duration,
    /// Handling the request, probe included
    write: Duration,
}

/// Startup errors
#[derive(Error, Debug)]
enum ExporterError {
    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_logging(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::default().add_directive(level.into())
    });

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Logfmt => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), ExporterError> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);

    info!("FENECON Exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = args.probe_config();
    info!(?config, "probe configuration");

    let timeouts = args.server_timeouts();
    info!(?timeouts, "server timeouts");

    let state = Arc::new(AppState::new(config)?);
    let app = router(state, timeouts);

    info!("Starting server on http://{}", args.bind);
    info!("Probe endpoint: http://{}/probe?target=<url>", args.bind);

    let listener = TcpListener::bind(args.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn router(state: Arc<AppState>, timeouts: ServerTimeouts) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/probe", get(probe_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .route("/readyz", get(health_handler))
        .layer(RequestBodyTimeoutLayer::new(timeouts.read))
        .layer(TimeoutLayer::new(timeouts.write))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>FENECON Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>FENECON Exporter</h1>
    <p>Prometheus multi-target exporter for FENECON energy management systems.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><code>/probe?target=http://192.168.1.50&amp;meter=1&amp;ess=1&amp;charger=0</code> - Probe a device</div>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Exporter metrics</div>
        <div class="endpoint"><a href="/healthz">/healthz</a> - Health check</div>
        <div class="endpoint"><a href="/readyz">/readyz</a> - Readiness check</div>
    </div>

    <h2>Probe parameters</h2>
    <ul>
        <li><code>target</code> - Device base URL (required)</li>
        <li><code>meter</code>, <code>ess</code>, <code>charger</code> - Number of modules, discovered when omitted</li>
        <li><code>timeout</code> - Probe deadline in seconds, defaults to the scrape timeout</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", prometheus::TEXT_FORMAT)],
        metrics,
    )
}

/// Health and readiness handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "Ok")
}
