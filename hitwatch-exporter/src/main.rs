// Hitwatch Exporter - Access log tailer and Prometheus exporter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Hitwatch Exporter
//!
//! Tails an HTTP access log, reports per-section traffic, raises high-traffic
//! alerts, and serves the results as Prometheus metrics.
//!
//! ## Usage
//!
//! ```bash
//! # Follow a live log, alert above 10 hits/s
//! hitwatch-exporter --file /var/log/access.log --threshold 10
//!
//! # Replay an old log using its own timestamps
//! hitwatch-exporter --file old.log --threshold 10 --no-follow --event-time
//!
//! # Read from stdin with a JSON configuration
//! tail -F access.log | hitwatch-exporter --file - --config hitwatch.json
//! ```

mod error;
mod metrics;
mod pipeline;
mod tail;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use error::ExporterError;
use hitwatch::{CommonLogParser, MonitorConfig, TrafficMonitor};
use metrics::encode_metrics;
use pipeline::{Pipeline, Published, SharedState};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tail::{InputSource, TailConfig};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Hitwatch access log monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to read ("-" for stdin)
    #[arg(short, long, default_value = "/tmp/access.log")]
    file: String,

    /// Alert threshold in average hits per second
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Watch window length in seconds
    #[arg(long)]
    watch_secs: Option<u32>,

    /// Alert window length in minutes
    #[arg(long)]
    alert_minutes: Option<u32>,

    /// JSON configuration file (command line values take precedence)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Read the whole file and stop at its end instead of following it
    #[arg(long)]
    no_follow: bool,

    /// Close windows from record timestamps only (no wall-clock ticks);
    /// a followed file is then read from the start
    #[arg(long)]
    event_time: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    published: SharedState,
    start_time: Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Hitwatch Exporter v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ExporterError> {
    let config = build_config(&args)?;
    let monitor = TrafficMonitor::new(config)?;
    let parser = CommonLogParser::new().map_err(|e| ExporterError::Pattern(e.to_string()))?;

    let pipeline = Pipeline::new(monitor, parser);
    let state = Arc::new(AppState {
        published: pipeline.shared(),
        start_time: Instant::now(),
    });

    // Reader task feeds the monitor task
    let (tx, rx) = mpsc::channel(1024);
    // Live follows start at the end; a backlog would be judged against now.
    let follow = !args.no_follow;
    let tail_config = TailConfig {
        source: InputSource::from_arg(&args.file),
        follow,
        start_at_end: follow && !args.event_time,
        ..Default::default()
    };
    tokio::spawn(async move {
        if let Err(e) = tail::run(tail_config, tx).await {
            error!("Reader stopped: {}", e);
        }
    });

    let tick_every = if args.event_time {
        None
    } else {
        Some(Duration::from_secs(1))
    };
    tokio::spawn(async move {
        match pipeline.run(rx, tick_every).await {
            Ok(()) => info!("Monitor finished, serving final results"),
            Err(e) => error!("Monitor stopped: {}", e),
        }
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Merge the configuration file, if any, with command line overrides.
fn build_config(args: &Args) -> Result<MonitorConfig, ExporterError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            MonitorConfig::from_json(&std::fs::read_to_string(path)?)?
        }
        None => MonitorConfig::new(args.threshold.ok_or(ExporterError::MissingThreshold)?),
    };

    if let Some(threshold) = args.threshold {
        config.alert.threshold = threshold;
    }
    if let Some(secs) = args.watch_secs {
        config.watch.duration_secs = secs;
    }
    if let Some(minutes) = args.alert_minutes {
        config.alert.duration_minutes = minutes;
    }

    config.validate()?;
    Ok(config)
}

/// Root handler - shows the latest results as plain text.
async fn root_handler(State(state): State<Arc<AppState>>) -> String {
    let published = state.published.read().await;
    let mut page = format!(
        "Hitwatch Exporter v{}\n\nAlert: {} (threshold {}/s)\n",
        env!("CARGO_PKG_VERSION"),
        published.alert.status.as_str(),
        published.threshold
    );

    if let Some(window) = published.history.last() {
        page.push_str(&format!(
            "Last alert window: {} - {}, {:.2} hits/s\n",
            window.start(),
            window.end(),
            window.average()
        ));
    }
    for alert in &published.recent_alerts {
        page.push_str(&format!("  {}\n", alert.message));
    }

    page.push('\n');
    match &published.last_watch {
        Some(snapshot) => page.push_str(&snapshot.report()),
        None => page.push_str("No watch window closed yet\n"),
    }

    page.push_str("\nEndpoints: /metrics /health /status\n");
    page
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(metrics) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            metrics,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("Content-Type", "text/plain; charset=utf-8")],
            e.to_string(),
        ),
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    #[serde(flatten)]
    monitor: Published,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let monitor = state.published.read().await.clone();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        monitor,
    })
}
