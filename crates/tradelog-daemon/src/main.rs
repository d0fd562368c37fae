//! tradelog - watches the game client log for trade whispers.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tradelog_core::TailReader;
use tradelog_daemon::{config::Config, logging, routes, state::AppState};

use logging::{LogConfig, LogFormat};

/// Trade whisper tracker for the game client log.
#[derive(Parser, Debug)]
#[command(name = "tradelog")]
#[command(about = "Tails the game client log and keeps a list of pending trades")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the client log path from config
    #[arg(long, value_name = "FILE")]
    client_log: Option<PathBuf>,

    /// Read the client log from the beginning instead of the end
    #[arg(long)]
    replay: bool,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level, per-poll tail noise stays at INFO)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "gate=debug" or "tail=trace").
    /// Targets are prefixed with "tradelog::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(path) = cli.client_log {
        config.log_path = path;
    }

    tracing::info!(
        target: "tradelog::startup",
        "Loaded configuration (port: {}, log: {})",
        config.port,
        config.log_path.display()
    );

    let state = Arc::new(AppState::new(config.clone())?);
    tracing::info!(
        target: "tradelog::startup",
        "Loaded {} trigger rules",
        state.pipeline.engine().rules().len()
    );

    let ctx = state.pipeline.context();
    let reader = if cli.replay {
        TailReader::open_from_start(&config.log_path, ctx)
    } else {
        TailReader::open(&config.log_path, ctx)
    }
    .with_context(|| format!("cannot open client log {}", config.log_path.display()))?;

    let watch = state.pipeline.start(reader, Arc::clone(&state.probe));
    tracing::info!(target: "tradelog::startup", "Started tail and window loops");

    let app = routes::router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "tradelog::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(target: "tradelog::startup", "Failed to listen for ctrl-c: {}", e);
            }
        })
        .await?;

    watch.stop().await;
    tracing::info!(target: "tradelog::startup", "Shut down");
    Ok(())
}
