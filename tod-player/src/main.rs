//! TrackOrDie player (tod-player) - Main entry point
//!
//! Playlist-driven tracker-music player: loads the configuration, starts the
//! engine adapter and the playback orchestrator, and serves the HTTP/SSE
//! control surface until Ctrl+C or SIGTERM.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tod_player::config::{Config, LoggingConfig, Overrides, TomlConfig};
use tod_player::engine::{ClockEngine, ClockSettings, PlaybackEngine};
use tod_player::playback::{InitState, MediaFetcher, Orchestrator, SourceFetcher};

/// Command-line arguments for tod-player
#[derive(Parser, Debug)]
#[command(name = "tod-player")]
#[command(about = "Playlist-driven tracker music player")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "TOD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "TOD_PORT")]
    port: Option<u16>,

    /// Folder that relative track URLs resolve against
    #[arg(short, long, env = "TOD_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Playlist to select at startup (catalog index)
    #[arg(long)]
    playlist: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration comes first so logging can honour it
    let config_file = tod_common::config::resolve_config_file(args.config.as_deref(), "TOD_CONFIG")
        .context("Failed to resolve configuration file")?;
    let toml_config =
        TomlConfig::load(config_file.as_deref()).context("Failed to load configuration")?;
    let config = Config::resolve(
        toml_config,
        Overrides {
            port: args.port,
            media_root: args.media_root.clone(),
        },
    )
    .context("Invalid configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting TrackOrDie player v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );
    match &config_file {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }
    info!("Media root: {}", config.media_root.display());
    if let Some(base) = &config.media_base_url {
        info!("Media base URL: {}", base);
    }
    info!("Catalog: {} playlists", config.catalog.len());

    let engine: Arc<dyn PlaybackEngine> = Arc::new(ClockEngine::new(ClockSettings {
        media_root: config.media_root.clone(),
        track_seconds: config.engine.track_seconds,
    }));
    let fetcher: Arc<dyn SourceFetcher> = Arc::new(
        MediaFetcher::new(config.media_root.clone(), config.media_base_url.clone())
            .context("Failed to build media fetcher")?,
    );

    // The engine reports readiness separately so a startup playlist
    // selection is held until it can actually play
    let orchestrator = Orchestrator::new(
        engine,
        fetcher,
        config.catalog.clone(),
        &config.playback,
        InitState { engine_ready: false },
    );

    if let Some(playlist) = args.playlist {
        if let Err(e) = orchestrator.select_playlist(playlist).await {
            warn!("Startup playlist {} not selected: {}", playlist, e);
        }
    }
    orchestrator.mark_engine_ready().await;

    let result = tod_player::api::run(
        config.listen_addr,
        Arc::clone(&orchestrator),
        shutdown_signal(),
    )
    .await;

    orchestrator.shutdown().await;
    result.context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing
///
/// `RUST_LOG` wins over the configured level. Logs go to the configured file
/// when one is set, stderr otherwise.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let default_filter = format!(
        "tod_player={level},tod_common={level},tower_http={level}",
        level = logging.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let file_layer = match &logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
